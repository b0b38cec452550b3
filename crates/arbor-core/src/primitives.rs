//! # Engine Primitives
//!
//! Hardcoded limits and defaults for the Arbor tree engine.
//!
//! These values are compiled into the binary. Depth limits can be overridden
//! per service through `TreeConfig`; field limits cannot.

/// Default depth cap for `TreeBuilder::build`.
///
/// A node at depth `d` (roots are depth 0) is included iff `d < cap`.
pub const DEFAULT_BUILD_MAX_DEPTH: usize = 20;

/// Default depth cap for `DescendantResolver::descendants`.
///
/// Children one level below the start node are depth 1.
pub const DEFAULT_DESCENDANT_MAX_DEPTH: usize = 10;

/// Upper bound accepted for any caller-supplied depth.
///
/// All traversals must be computationally bounded.
pub const MAX_TRAVERSAL_DEPTH: usize = 100;

/// Role id that bypasses every permission check.
pub const SUPERUSER_ROLE_ID: u64 = 1;

/// Link target assigned to menu nodes that do not specify one.
pub const DEFAULT_URL_TARGET: &str = "_self";

/// Items per page for new columns.
pub const DEFAULT_LIST_ROW: u32 = 10;

/// Sort value for new columns.
pub const DEFAULT_COLUMN_ORDER: i64 = 100;

/// Title shown for the root entry of a parent picker.
pub const ROOT_OPTION_TITLE: &str = "(top level)";

// =============================================================================
// FIELD LIMITS (characters)
// =============================================================================

pub const MAX_PARTITION_LENGTH: usize = 16;

pub const MAX_MENU_TITLE_LENGTH: usize = 32;
pub const MAX_MENU_ICON_LENGTH: usize = 64;
pub const MAX_MENU_URL_LENGTH: usize = 255;
pub const MAX_MENU_URL_TYPE_LENGTH: usize = 16;
pub const MAX_MENU_URL_TARGET_LENGTH: usize = 16;

pub const MAX_COLUMN_TITLE_LENGTH: usize = 100;
pub const MAX_COLUMN_NAME_LENGTH: usize = 50;
pub const MAX_COLUMN_KEYWORDS_LENGTH: usize = 500;
pub const MAX_COLUMN_COVER_LENGTH: usize = 500;
pub const MAX_COLUMN_URL_LENGTH: usize = 200;
pub const MAX_COLUMN_TEMPLATE_LENGTH: usize = 100;

/// Maximum number of ids in one bulk status or reorder request.
pub const MAX_BATCH_IDS: usize = 1000;
