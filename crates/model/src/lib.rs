//! Storage contract, groups and configuration for hierarchical tree views.
//! 階層樹狀檢視的儲存契約、群組與設定。

mod util;

pub mod client;
pub mod fields;
pub mod groups;
pub mod options;
pub mod permissions;
pub mod provision;
pub mod query;

pub use client::{ClientError, DataClient};
pub use fields::{
    default_definition, default_definitions, validate_field, validate_fields, FieldDefinition,
    FieldIssue, FieldKey, ModelContext, SchemaError,
};
pub use groups::{Group, GroupRegistry, UNGROUPED};
pub use options::{ConfigError, LayoutOptions, LayoutOptionsStore, OptionsError, RequiredOptions};
pub use permissions::{PermissionAction, Permissions};
pub use provision::{provision_model, ProvisionReport, ProvisionRequest};
pub use query::{fields_from_template, tree_item_query, ItemQuery};
