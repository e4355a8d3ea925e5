use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Warning,
    Danger,
}

/// Message the host shows above the tree.
/// 顯示於樹狀檢視上方的提示訊息。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserNotice {
    pub kind: NoticeKind,
    pub title: String,
    pub text: String,
}

impl UserNotice {
    fn new(kind: NoticeKind, title: &str, text: String) -> Self {
        Self {
            kind,
            title: title.to_string(),
            text,
        }
    }

    pub fn limited_permission(collection: &str) -> Self {
        Self::new(
            NoticeKind::Danger,
            "Limited permission",
            format!(
                "You need permission to read all mandatory fields from [{collection}] collection. \
                 To fix this, contact your administrator."
            ),
        )
    }

    pub fn incomplete_configuration() -> Self {
        Self::new(
            NoticeKind::Danger,
            "Incomplete configuration",
            "Go to [Layout Options > Configuration] and ensure all required fields are set."
                .to_string(),
        )
    }

    pub fn invalid_structure() -> Self {
        Self::new(
            NoticeKind::Danger,
            "Invalid collection structure",
            "Some collection fields have unexpected schema. For more details, see the log."
                .to_string(),
        )
    }

    pub fn invalid_depth() -> Self {
        Self::new(
            NoticeKind::Warning,
            "Invalid level depth",
            "Please move highlighted items up. Until then changes cannot be saved.".to_string(),
        )
    }

    pub fn empty_collection(collection: &str) -> Self {
        Self::new(
            NoticeKind::Info,
            "Nothing to show yet",
            format!("The collection [{collection}] seems not to have any items yet."),
        )
    }

    pub fn search_unsupported() -> Self {
        Self::new(
            NoticeKind::Warning,
            "Feature not supported",
            "Search and Filter are not supported by this layout, hence has no effect.".to_string(),
        )
    }
}
