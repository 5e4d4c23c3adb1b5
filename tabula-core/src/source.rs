//! Source descriptors: where a dataset comes from and how to reach it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::credential::CredentialSpec;

/// Errors raised while interpreting a format tag.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    /// The tag is not one of the supported file formats.
    #[error("unsupported format '{tag}'; expected one of csv, tsv, json, geojson")]
    Unsupported {
        /// Tag supplied by the caller.
        tag: String,
    },
}

/// Declared format of a file source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum FileFormat {
    /// Comma separated values.
    Csv,
    /// Tab separated values.
    Tsv,
    /// JSON array or object.
    Json,
    /// GeoJSON `FeatureCollection`.
    GeoJson,
}

impl FileFormat {
    /// Every supported format, in display order.
    pub const ALL: [Self; 4] = [Self::Csv, Self::Tsv, Self::Json, Self::GeoJson];

    /// Lowercase tag accepted on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Json => "json",
            Self::GeoJson => "geojson",
        }
    }

    /// Field delimiter for delimited formats.
    #[must_use]
    pub const fn delimiter(self) -> Option<u8> {
        match self {
            Self::Csv => Some(b','),
            Self::Tsv => Some(b'\t'),
            Self::Json | Self::GeoJson => None,
        }
    }
}

impl FromStr for FileFormat {
    type Err = FormatError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(tag.trim()))
            .ok_or_else(|| FormatError::Unsupported {
                tag: tag.to_owned(),
            })
    }
}

impl TryFrom<String> for FileFormat {
    type Error = FormatError;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        tag.parse()
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FileFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// HTTP method used to call an API source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum HttpMethod {
    /// `GET`
    #[default]
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl HttpMethod {
    /// Uppercase method token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl TryFrom<String> for HttpMethod {
    type Error = String;

    fn try_from(token: String) -> Result<Self, Self::Error> {
        match token.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _ => Err(format!("unsupported HTTP method '{token}'")),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for HttpMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Failure to follow a [`DataPath`] through a response.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataPathError {
    /// A segment was missing or traversed a non-object.
    #[error("data path '{path}' not found in response")]
    NotFound {
        /// The full path requested.
        path: String,
    },
}

/// Dot-separated key path into a JSON response, such as `result.items`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataPath(String);

impl DataPath {
    /// Wrap a dot-separated path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The path as supplied.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Non-empty path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.').filter(|segment| !segment.is_empty())
    }

    /// Follow the path through nested objects.
    ///
    /// # Examples
    /// ```
    /// use tabula_core::DataPath;
    ///
    /// let body = serde_json::json!({"result": {"items": [1, 2]}});
    /// let items = DataPath::new("result.items").resolve(&body).expect("path exists");
    /// assert_eq!(items, &serde_json::json!([1, 2]));
    /// ```
    pub fn resolve<'a>(
        &self,
        value: &'a serde_json::Value,
    ) -> Result<&'a serde_json::Value, DataPathError> {
        self.segments().try_fold(value, |current, segment| {
            current
                .as_object()
                .and_then(|object| object.get(segment))
                .ok_or_else(|| self.not_found())
        })
    }

    /// Move the value at the end of the path out of `value`.
    ///
    /// Unlike [`DataPath::resolve`], the target is not copied.
    ///
    /// # Errors
    ///
    /// Returns [`DataPathError::NotFound`] when a segment is missing or
    /// crosses a non-object.
    pub fn extract(&self, mut value: serde_json::Value) -> Result<serde_json::Value, DataPathError> {
        let mut current = &mut value;
        for segment in self.segments() {
            current = current
                .as_object_mut()
                .and_then(|object| object.get_mut(segment))
                .ok_or_else(|| self.not_found())?;
        }
        Ok(current.take())
    }

    fn not_found(&self) -> DataPathError {
        DataPathError::NotFound {
            path: self.0.clone(),
        }
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A remote file reachable by a (usually pre-signed) URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSource {
    /// Download URL.
    pub url: String,
    /// Declared content format.
    pub format: FileFormat,
}

/// An HTTP API returning JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSource {
    /// Endpoint URL.
    pub endpoint: String,
    /// Request method.
    #[serde(default)]
    pub method: HttpMethod,
    /// Caller supplied request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Optional credential turned into auth headers.
    #[serde(default)]
    pub credential: Option<CredentialSpec>,
    /// Optional path to the records inside the response.
    #[serde(default, alias = "data_path")]
    pub data_path: Option<DataPath>,
}

/// A SQL endpoint accepting `{query, database}` over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlSource {
    /// Endpoint URL.
    pub endpoint: String,
    /// Target database name.
    pub database: String,
    /// Query text.
    pub query: String,
    /// Optional credential turned into auth headers.
    #[serde(default)]
    pub credential: Option<CredentialSpec>,
}

/// Kind of source, used in metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Remote file.
    File,
    /// HTTP API.
    Api,
    /// SQL endpoint.
    Sql,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::File => "file",
            Self::Api => "api",
            Self::Sql => "sql",
        })
    }
}

/// Where to read a dataset from.
///
/// # Examples
/// ```
/// use tabula_core::{FileFormat, SourceDescriptor};
///
/// let source: SourceDescriptor = serde_json::from_value(serde_json::json!({
///     "type": "file",
///     "url": "https://example.com/data.csv",
///     "format": "csv"
/// }))
/// .expect("valid descriptor");
/// assert!(matches!(source, SourceDescriptor::File(ref file) if file.format == FileFormat::Csv));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceDescriptor {
    /// Remote file download.
    File(FileSource),
    /// HTTP API call.
    Api(ApiSource),
    /// SQL query endpoint.
    Sql(SqlSource),
}

impl SourceDescriptor {
    /// Kind of this source.
    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        match self {
            Self::File(_) => SourceKind::File,
            Self::Api(_) => SourceKind::Api,
            Self::Sql(_) => SourceKind::Sql,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("csv", FileFormat::Csv)]
    #[case("TSV", FileFormat::Tsv)]
    #[case("json", FileFormat::Json)]
    #[case("GeoJSON", FileFormat::GeoJson)]
    fn parses_format_tags(#[case] tag: &str, #[case] expected: FileFormat) {
        assert_eq!(tag.parse::<FileFormat>(), Ok(expected));
    }

    #[rstest]
    fn rejects_unknown_format_tags() {
        assert_eq!(
            "xlsx".parse::<FileFormat>(),
            Err(FormatError::Unsupported {
                tag: "xlsx".to_owned()
            })
        );
        let err = serde_json::from_value::<SourceDescriptor>(json!({
            "type": "file", "url": "https://x", "format": "xlsx"
        }))
        .expect_err("unknown format should not decode");
        assert!(err.to_string().contains("unsupported format 'xlsx'"));
    }

    #[rstest]
    fn decodes_api_descriptor_with_defaults() {
        let source: SourceDescriptor = serde_json::from_value(json!({
            "type": "api",
            "endpoint": "https://api.example.com/items",
            "dataPath": "result.items"
        }))
        .expect("valid descriptor");
        let SourceDescriptor::Api(api) = source else {
            panic!("expected an API descriptor");
        };
        assert_eq!(api.method, HttpMethod::Get);
        assert!(api.headers.is_empty());
        assert_eq!(api.data_path, Some(DataPath::new("result.items")));
    }

    #[rstest]
    fn method_tokens_are_case_insensitive() {
        let method: HttpMethod = serde_json::from_value(json!("post")).expect("method");
        assert_eq!(method, HttpMethod::Post);
    }

    #[rstest]
    #[case(json!({"a": {"b": [1]}}), "a.b", Some(json!([1])))]
    #[case(json!({"a": {"b": [1]}}), "", Some(json!({"a": {"b": [1]}})))]
    #[case(json!({"a": {"b": [1]}}), "a.c", None)]
    #[case(json!({"a": [1]}), "a.b", None)]
    fn resolves_data_paths(
        #[case] body: serde_json::Value,
        #[case] path: &str,
        #[case] expected: Option<serde_json::Value>,
    ) {
        let resolved = DataPath::new(path).resolve(&body).ok().cloned();
        assert_eq!(resolved, expected);
        let extracted = DataPath::new(path).extract(body).ok();
        assert_eq!(extracted, expected);
    }
}
