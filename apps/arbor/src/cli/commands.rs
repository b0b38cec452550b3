//! # CLI Commands
//!
//! Each `cmd_*` opens the configured store, runs one engine operation and
//! prints the result as text or, with `--json-mode`, as JSON.

use super::KindArg;
use crate::api::{self, AppState, NodeJson, TreeNodeJson};
use crate::config::{ArborConfig, BackendKind};
use crate::error::AppError;
use arbor_core::{
    MenuPayload, NodeFields, NodeId, Partition, Payload, StorageBackend, TreeNode, TreeService,
};

/// Print a JSON value.
fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Open the configured store behind a service.
pub fn open_service(config: &ArborConfig) -> Result<TreeService, AppError> {
    let store = config.storage.open()?;
    tracing::debug!(backend = store.name(), "store opened");
    Ok(TreeService::new(store, config.tree))
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    mut config: ArborConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), AppError> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    let service = open_service(&config)?;

    println!("Arbor Tree Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", config.server.host);
    println!("  Port:     {}", config.server.port);
    println!("  Backend:  {}", service.store().name());
    println!("  Database: {:?}", config.storage.path);
    println!("  Roles:    {}", config.roles.len());
    println!();
    println!("Endpoints:");
    println!("  GET  /partitions                 - Partition tabs");
    println!("  GET  /partitions/{{p}}/tree        - Assembled tree");
    println!("  POST /nodes                      - Create a node");
    println!("  PUT  /nodes/{{id}}                 - Overwrite a node");
    println!("  POST /nodes/{{id}}/move            - Change parent");
    println!("  GET  /health                     - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = AppState::new(service, config.roles.clone()).with_server(config.server);
    api::run_server(state).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(config: &ArborConfig, force: bool) -> Result<(), AppError> {
    let path = &config.storage.path;
    if config.storage.backend == BackendKind::Memory {
        println!("Memory backend selected: nothing to initialize");
        return Ok(());
    }

    if path.exists() {
        if !force {
            return Err(AppError::Io(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(path)
            .map_err(|e| AppError::Io(format!("Remove {:?}: {}", path, e)))?;
    }

    StorageBackend::redb(path)?;
    println!("Initialized new redb database at {:?}", path);
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show node and partition counts.
pub fn cmd_status(config: &ArborConfig, json_mode: bool) -> Result<(), AppError> {
    let service = open_service(config)?;
    let status = service.status()?;

    if json_mode {
        print_json(&serde_json::json!({
            "database": config.storage.path.to_string_lossy(),
            "backend": service.store().name(),
            "node_count": status.node_count,
            "partition_count": status.partition_count,
        }));
        return Ok(());
    }

    println!("Arbor Status");
    println!("============");
    println!("Database:   {:?}", config.storage.path);
    println!("Backend:    {}", service.store().name());
    println!();
    println!("Nodes:      {}", status.node_count);
    println!("Partitions: {}", status.partition_count);
    Ok(())
}

/// List partition tabs.
pub fn cmd_partitions(config: &ArborConfig, json_mode: bool) -> Result<(), AppError> {
    let service = open_service(config)?;
    let tabs = service.partitions()?;

    if json_mode {
        print_json(&serde_json::json!({ "partitions": tabs }));
        return Ok(());
    }

    println!("Partitions");
    println!("==========");
    if tabs.is_empty() {
        println!("(none)");
    }
    for tab in tabs {
        println!("{:<16} {} (root {})", tab.partition, tab.title, tab.root);
    }
    Ok(())
}

// =============================================================================
// TREE COMMAND
// =============================================================================

fn print_tree(tree: &TreeNode) {
    let marker = if tree.node.active { "" } else { " [inactive]" };
    println!(
        "{}[{}] {}{}",
        "  ".repeat(tree.depth),
        tree.node.id,
        tree.node.title,
        marker
    );
    for child in &tree.children {
        print_tree(child);
    }
}

/// Print the forest of a partition.
pub fn cmd_tree(
    config: &ArborConfig,
    json_mode: bool,
    partition: &str,
    all: bool,
) -> Result<(), AppError> {
    let service = open_service(config)?;
    let partition = Partition::new(partition);
    let forest = service.get_or_build(&partition, all)?;

    if json_mode {
        let roots: Vec<TreeNodeJson> = forest.roots.iter().map(TreeNodeJson::from).collect();
        print_json(&serde_json::json!({
            "partition": partition,
            "node_count": forest.node_count(),
            "roots": roots,
            "warnings": forest.warnings,
        }));
        return Ok(());
    }

    println!("Tree: {}", partition);
    println!("======{}", "=".repeat(partition.as_str().len()));
    if forest.roots.is_empty() {
        println!("(empty)");
    }
    for root in &forest.roots {
        print_tree(root);
    }
    for warning in &forest.warnings {
        println!("warning: {:?}", warning);
    }
    Ok(())
}

// =============================================================================
// MUTATION COMMANDS
// =============================================================================

/// Arguments of `add`.
#[derive(Debug, Clone)]
pub struct AddArgs {
    pub partition: String,
    pub title: String,
    pub parent: u64,
    pub kind: KindArg,
    pub order: Option<i64>,
    pub url: Option<String>,
}

impl AddArgs {
    fn to_fields(&self) -> NodeFields {
        let parent = NodeId(self.parent);
        let mut fields = match self.kind {
            KindArg::Menu => {
                let mut fields = NodeFields::menu(self.partition.clone(), self.title.clone(), parent);
                if let Some(url) = &self.url {
                    fields.payload = Payload::Menu(MenuPayload {
                        url_value: url.clone(),
                        ..MenuPayload::default()
                    });
                }
                fields
            }
            KindArg::Column => {
                let mut fields =
                    NodeFields::column(self.partition.clone(), self.title.clone(), parent);
                if let (Some(url), Payload::Column(column)) = (&self.url, &mut fields.payload) {
                    column.url = url.clone();
                }
                fields
            }
        };
        if let Some(order) = self.order {
            fields.order_key = order;
        }
        fields
    }
}

fn print_node(json_mode: bool, verb: &str, node: &arbor_core::Node) {
    if json_mode {
        print_json(&serde_json::json!({
            "success": true,
            "node": NodeJson::from(node),
        }));
    } else {
        println!(
            "{} node {} \"{}\" (partition {}, parent {})",
            verb, node.id, node.title, node.partition, node.parent_id
        );
    }
}

/// Create a node.
pub fn cmd_add(config: &ArborConfig, json_mode: bool, args: AddArgs) -> Result<(), AppError> {
    let service = open_service(config)?;
    let node = service.create(args.to_fields())?;
    print_node(json_mode, "Created", &node);
    Ok(())
}

/// Change the parent of a node.
pub fn cmd_move(config: &ArborConfig, json_mode: bool, id: u64, parent: u64) -> Result<(), AppError> {
    let service = open_service(config)?;
    let outcome = service.reparent(NodeId(id), NodeId(parent))?;
    print_node(json_mode, "Moved", &outcome.node);
    Ok(())
}

/// Delete a leaf node.
pub fn cmd_remove(config: &ArborConfig, json_mode: bool, id: u64) -> Result<(), AppError> {
    let service = open_service(config)?;
    let node = service.delete(NodeId(id))?;
    print_node(json_mode, "Deleted", &node);
    Ok(())
}

// =============================================================================
// QUERY COMMANDS
// =============================================================================

/// List the descendants of a node.
pub fn cmd_descendants(
    config: &ArborConfig,
    json_mode: bool,
    id: u64,
    depth: Option<usize>,
) -> Result<(), AppError> {
    let service = open_service(config)?;
    let depth = depth.unwrap_or(config.tree.descendant_max_depth);
    let ids: Vec<u64> = service
        .descendants(NodeId(id), Some(depth))?
        .into_iter()
        .map(|id| id.0)
        .collect();

    if json_mode {
        print_json(&serde_json::json!({
            "id": id,
            "depth": depth,
            "descendants": ids,
        }));
        return Ok(());
    }

    println!("Descendants of {} (depth {})", id, depth);
    println!("==========================");
    if ids.is_empty() {
        println!("(none)");
    }
    for id in ids {
        println!("  {}", id);
    }
    Ok(())
}

/// Compact the redb database.
pub fn cmd_compact(config: &ArborConfig) -> Result<(), AppError> {
    match config.storage.open()? {
        StorageBackend::Persistent(mut store) => {
            store.compact()?;
            println!("Compacted {:?}", config.storage.path);
        }
        StorageBackend::InMemory(_) => println!("Memory backend selected: nothing to compact"),
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
