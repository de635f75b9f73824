use std::fmt::{self, Display};

///
/// Top-level query keys
///

pub const KEY_META: &str = "meta";
pub const KEY_USING: &str = "using";
pub const KEY_METHOD: &str = "method";
pub const KEY_CRITERIA: &str = "criteria";
pub const KEY_POPULATES: &str = "populates";
pub const KEY_EACH_RECORD_FN: &str = "eachRecordFn";
pub const KEY_EACH_BATCH_FN: &str = "eachBatchFn";
pub const KEY_NUMERIC_ATTR_NAME: &str = "numericAttrName";
pub const KEY_NEW_RECORD: &str = "newRecord";
pub const KEY_NEW_RECORDS: &str = "newRecords";
pub const KEY_VALUES_TO_SET: &str = "valuesToSet";
pub const KEY_TARGET_RECORD_IDS: &str = "targetRecordIds";
pub const KEY_COLLECTION_ATTR_NAME: &str = "collectionAttrName";
pub const KEY_ASSOCIATED_IDS: &str = "associatedIds";

/// Keys legal on every query regardless of method.
pub const UNIVERSAL_KEYS: [&str; 3] = [KEY_META, KEY_USING, KEY_METHOD];

const COLLECTION_KEYS: &[&str] = &[
    KEY_TARGET_RECORD_IDS,
    KEY_COLLECTION_ATTR_NAME,
    KEY_ASSOCIATED_IDS,
];

///
/// Method
///
/// Every operation the forge understands.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Find,
    FindOne,
    Stream,
    Count,
    Sum,
    Avg,
    Create,
    CreateEach,
    FindOrCreate,
    Update,
    Destroy,
    AddToCollection,
    RemoveFromCollection,
    ReplaceCollection,
}

impl Method {
    pub const ALL: [Self; 14] = [
        Self::Find,
        Self::FindOne,
        Self::Stream,
        Self::Count,
        Self::Sum,
        Self::Avg,
        Self::Create,
        Self::CreateEach,
        Self::FindOrCreate,
        Self::Update,
        Self::Destroy,
        Self::AddToCollection,
        Self::RemoveFromCollection,
        Self::ReplaceCollection,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Find => "find",
            Self::FindOne => "findOne",
            Self::Stream => "stream",
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Create => "create",
            Self::CreateEach => "createEach",
            Self::FindOrCreate => "findOrCreate",
            Self::Update => "update",
            Self::Destroy => "destroy",
            Self::AddToCollection => "addToCollection",
            Self::RemoveFromCollection => "removeFromCollection",
            Self::ReplaceCollection => "replaceCollection",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.as_str() == name)
    }

    /// Method-specific top-level keys, beyond the universal ones.
    #[must_use]
    pub const fn allowed_keys(self) -> &'static [&'static str] {
        match self {
            Self::Find | Self::FindOne => &[KEY_CRITERIA, KEY_POPULATES],
            Self::Stream => &[
                KEY_CRITERIA,
                KEY_POPULATES,
                KEY_EACH_RECORD_FN,
                KEY_EACH_BATCH_FN,
            ],
            Self::Count | Self::Destroy => &[KEY_CRITERIA],
            Self::Sum | Self::Avg => &[KEY_NUMERIC_ATTR_NAME, KEY_CRITERIA],
            Self::Create => &[KEY_NEW_RECORD],
            Self::CreateEach => &[KEY_NEW_RECORDS],
            Self::FindOrCreate => &[KEY_CRITERIA, KEY_NEW_RECORD],
            Self::Update => &[KEY_CRITERIA, KEY_VALUES_TO_SET],
            Self::AddToCollection | Self::RemoveFromCollection | Self::ReplaceCollection => {
                COLLECTION_KEYS
            }
        }
    }

    /// Whether `key` may appear on a query using this method.
    #[must_use]
    pub fn allows_key(self, key: &str) -> bool {
        UNIVERSAL_KEYS.contains(&key) || self.allowed_keys().contains(&key)
    }

    /// Whether results can be projected with `select` / `omit`.
    #[must_use]
    pub const fn can_project(self) -> bool {
        matches!(self, Self::Find | Self::FindOne | Self::Stream)
    }

    /// Whether the number of affected rows can be bounded with `limit`.
    #[must_use]
    pub const fn can_limit(self) -> bool {
        matches!(
            self,
            Self::Find | Self::Stream | Self::Sum | Self::Avg | Self::Update | Self::Destroy
        )
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
