//! # Field Validation
//!
//! Input validation for node mutations.
//!
//! - Reject missing required fields (title, partition)
//! - Enforce per-kind length limits
//! - Normalize fields the way they are stored (trimmed keys, lowercase urls)
//!
//! Referential checks (parent exists, same partition) need the store and live
//! in `store::check_parent`.

use crate::primitives::{
    DEFAULT_URL_TARGET, MAX_BATCH_IDS, MAX_COLUMN_COVER_LENGTH, MAX_COLUMN_KEYWORDS_LENGTH,
    MAX_COLUMN_NAME_LENGTH, MAX_COLUMN_TEMPLATE_LENGTH, MAX_COLUMN_TITLE_LENGTH,
    MAX_COLUMN_URL_LENGTH, MAX_MENU_ICON_LENGTH, MAX_MENU_TITLE_LENGTH, MAX_MENU_URL_LENGTH,
    MAX_MENU_URL_TARGET_LENGTH, MAX_MENU_URL_TYPE_LENGTH, MAX_PARTITION_LENGTH,
};
use crate::{ArborError, NodeFields, NodeId, Partition, Payload};

/// Validates and normalizes caller-supplied node fields.
pub struct FieldValidator;

impl FieldValidator {
    /// Validate fields for create or update, returning the normalized copy.
    ///
    /// Fails with `ArborError::Validation` naming the first offending field.
    pub fn validate(fields: NodeFields) -> Result<NodeFields, ArborError> {
        let NodeFields {
            parent_id,
            partition,
            title,
            order_key,
            active,
            payload,
        } = fields;

        let partition = partition.as_str().trim().to_string();
        if partition.is_empty() {
            return Err(ArborError::Validation("partition is required".into()));
        }
        check_len("partition", &partition, MAX_PARTITION_LENGTH)?;

        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(ArborError::Validation("title is required".into()));
        }

        let payload = match payload {
            Payload::Menu(mut menu) => {
                check_len("title", &title, MAX_MENU_TITLE_LENGTH)?;
                check_len("icon", &menu.icon, MAX_MENU_ICON_LENGTH)?;
                check_len("url_value", &menu.url_value, MAX_MENU_URL_LENGTH)?;
                check_len("url_type", &menu.url_type, MAX_MENU_URL_TYPE_LENGTH)?;
                check_len("url_target", &menu.url_target, MAX_MENU_URL_TARGET_LENGTH)?;
                menu.url_value = menu.url_value.trim().to_lowercase();
                if menu.url_target.trim().is_empty() {
                    menu.url_target = DEFAULT_URL_TARGET.to_string();
                }
                Payload::Menu(menu)
            }
            Payload::Column(column) => {
                check_len("title", &title, MAX_COLUMN_TITLE_LENGTH)?;
                check_len("name", &column.name, MAX_COLUMN_NAME_LENGTH)?;
                check_len("keywords", &column.keywords, MAX_COLUMN_KEYWORDS_LENGTH)?;
                check_len("cover", &column.cover, MAX_COLUMN_COVER_LENGTH)?;
                check_len("url", &column.url, MAX_COLUMN_URL_LENGTH)?;
                check_len("list_template", &column.list_template, MAX_COLUMN_TEMPLATE_LENGTH)?;
                check_len(
                    "detail_template",
                    &column.detail_template,
                    MAX_COLUMN_TEMPLATE_LENGTH,
                )?;
                check_len("page_template", &column.page_template, MAX_COLUMN_TEMPLATE_LENGTH)?;
                if column.list_row == 0 {
                    return Err(ArborError::Validation("list_row must be positive".into()));
                }
                Payload::Column(column)
            }
        };

        Ok(NodeFields {
            parent_id,
            partition: Partition(partition),
            title,
            order_key,
            active,
            payload,
        })
    }

    /// Validate the id list of a bulk request.
    ///
    /// Rejects empty lists, lists above `MAX_BATCH_IDS`, the root sentinel and
    /// duplicates.
    pub fn validate_ids(ids: &[NodeId]) -> Result<(), ArborError> {
        if ids.is_empty() {
            return Err(ArborError::Validation("no nodes selected".into()));
        }
        if ids.len() > MAX_BATCH_IDS {
            return Err(ArborError::Validation(format!(
                "{} ids exceeds maximum {}",
                ids.len(),
                MAX_BATCH_IDS
            )));
        }
        let mut seen = std::collections::BTreeSet::new();
        for id in ids {
            if id.is_root() {
                return Err(ArborError::Validation("id 0 is not a node".into()));
            }
            if !seen.insert(*id) {
                return Err(ArborError::Validation(format!("duplicate id {}", id)));
            }
        }
        Ok(())
    }
}

/// Length check in characters, not bytes: titles are frequently CJK.
fn check_len(field: &str, value: &str, max: usize) -> Result<(), ArborError> {
    let len = value.chars().count();
    if len > max {
        return Err(ArborError::Validation(format!(
            "{} length {} exceeds maximum {}",
            field, len, max
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::{ColumnPayload, MenuPayload};

    #[test]
    fn missing_title_rejected() {
        let fields = NodeFields::menu("admin", "   ", NodeId::ROOT);
        let result = FieldValidator::validate(fields);
        assert!(matches!(result, Err(ArborError::Validation(msg)) if msg.contains("title")));
    }

    #[test]
    fn missing_partition_rejected() {
        let fields = NodeFields::menu("", "Dashboard", NodeId::ROOT);
        let result = FieldValidator::validate(fields);
        assert!(matches!(result, Err(ArborError::Validation(msg)) if msg.contains("partition")));
    }

    #[test]
    fn menu_title_limit_counts_characters() {
        let title: String = std::iter::repeat_n('节', MAX_MENU_TITLE_LENGTH).collect();
        let ok = NodeFields::menu("admin", title.clone(), NodeId::ROOT);
        assert!(FieldValidator::validate(ok).is_ok());

        let too_long = NodeFields::menu("admin", format!("{}x", title), NodeId::ROOT);
        assert!(FieldValidator::validate(too_long).is_err());
    }

    #[test]
    fn column_title_allows_longer_text() {
        let title = "a".repeat(MAX_MENU_TITLE_LENGTH + 10);
        let fields = NodeFields::column("cms", title, NodeId::ROOT);
        assert!(FieldValidator::validate(fields).is_ok());
    }

    #[test]
    fn menu_url_is_lowercased_and_target_defaulted() {
        let mut fields = NodeFields::menu(" admin ", " Users ", NodeId::ROOT);
        fields.payload = Payload::Menu(MenuPayload {
            url_value: "Admin/User/Index".into(),
            url_target: String::new(),
            ..MenuPayload::default()
        });

        let normalized = FieldValidator::validate(fields).expect("valid");
        assert_eq!(normalized.partition.as_str(), "admin");
        assert_eq!(normalized.title, "Users");
        match normalized.payload {
            Payload::Menu(menu) => {
                assert_eq!(menu.url_value, "admin/user/index");
                assert_eq!(menu.url_target, "_self");
            }
            Payload::Column(_) => panic!("expected menu payload"),
        }
    }

    #[test]
    fn zero_list_row_rejected() {
        let mut fields = NodeFields::column("cms", "News", NodeId::ROOT);
        fields.payload = Payload::Column(ColumnPayload {
            list_row: 0,
            ..ColumnPayload::default()
        });
        assert!(FieldValidator::validate(fields).is_err());
    }

    #[test]
    fn id_list_rules() {
        assert!(FieldValidator::validate_ids(&[]).is_err());
        assert!(FieldValidator::validate_ids(&[NodeId(0)]).is_err());
        assert!(FieldValidator::validate_ids(&[NodeId(1), NodeId(1)]).is_err());
        assert!(FieldValidator::validate_ids(&[NodeId(1), NodeId(2)]).is_ok());
    }
}
