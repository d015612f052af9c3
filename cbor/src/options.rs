/// Default bound on nested arrays, maps and tags.
pub const DEFAULT_MAX_DEPTH: u32 = 1024;

/// What record decoding does with map entries or array items that match no
/// field.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum UnknownFields {
    #[default]
    Ignore,
    Error,
}

/// Settings for a single encode or decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Options {
    /// Encode canonically, and reject non-canonical input when decoding.
    pub canonical: bool,

    pub max_depth: u32,

    pub unknown_fields: UnknownFields,

    /// Encode records as arrays in declaration order instead of maps keyed by
    /// field name.
    pub positional_records: bool,

    /// Cap on the size of encoded output.
    pub max_output_len: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            canonical: false,
            max_depth: DEFAULT_MAX_DEPTH,
            unknown_fields: UnknownFields::Ignore,
            positional_records: false,
            max_output_len: None,
        }
    }
}

impl Options {
    pub fn canonical() -> Self {
        Self {
            canonical: true,
            ..Self::default()
        }
    }

    pub fn with_canonical(self, canonical: bool) -> Self {
        Self { canonical, ..self }
    }

    pub fn with_max_depth(self, max_depth: u32) -> Self {
        Self { max_depth, ..self }
    }

    pub fn with_unknown_fields(self, unknown_fields: UnknownFields) -> Self {
        Self {
            unknown_fields,
            ..self
        }
    }

    pub fn with_positional_records(self, positional_records: bool) -> Self {
        Self {
            positional_records,
            ..self
        }
    }

    pub fn with_max_output_len(self, max_output_len: usize) -> Self {
        Self {
            max_output_len: Some(max_output_len),
            ..self
        }
    }
}
