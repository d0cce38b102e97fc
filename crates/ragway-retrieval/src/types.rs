use serde::{Deserialize, Serialize};

/// Envelope every indexing service wraps its payload in.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

/// Caller identity attached to every retrieval call.
#[derive(Debug, Clone, Default)]
pub struct RetrievalContext {
    pub client_id: String,
    pub codebase_path: String,
    /// Forwarded verbatim as the `Authorization` header.
    pub authorization: String,
    /// Sent as the `client-version` header when non-empty.
    pub client_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SemanticData {
    #[serde(default)]
    pub list: Vec<SemanticResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SemanticResult {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: f64,
    #[serde(rename = "filePath", default)]
    pub file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    #[serde(rename = "startLine")]
    pub start_line: u32,
    #[serde(rename = "startColumn", default)]
    pub start_column: u32,
    #[serde(rename = "endLine")]
    pub end_line: u32,
    #[serde(rename = "endColumn", default)]
    pub end_column: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefinitionData {
    #[serde(default)]
    pub list: Vec<Definition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Definition {
    #[serde(rename = "filePath", default)]
    pub file_path: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub content: String,
    pub position: Option<Position>,
}

/// A node in the reference tree. `children` nests further hops up to the
/// requested layer depth.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceNode {
    #[serde(default)]
    pub content: String,
    #[serde(rename = "nodeType", default)]
    pub node_type: String,
    #[serde(rename = "filePath", default)]
    pub file_path: String,
    pub position: Option<Position>,
    #[serde(default)]
    pub children: Vec<ReferenceNode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_envelope_decodes() {
        let json = r#"{"code":0,"message":"ok","data":{"list":[
            {"content":"func main(){}","score":0.9,"filePath":"a.go"}
        ]}}"#;
        let env: ApiEnvelope<SemanticData> = serde_json::from_str(json).unwrap();
        let data = env.data.unwrap();
        assert_eq!(data.list.len(), 1);
        assert_eq!(data.list[0].file_path, "a.go");
        assert!((data.list[0].score - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn reference_tree_nests() {
        let json = r#"{"content":"root","nodeType":"function","filePath":"a.rs",
            "position":{"startLine":1,"startColumn":0,"endLine":2,"endColumn":0},
            "children":[{"content":"leaf","nodeType":"call","filePath":"b.rs","children":[]}]}"#;
        let node: ReferenceNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.children.len(), 1);
        assert_eq!(node.children[0].file_path, "b.rs");
        assert!(node.children[0].children.is_empty());
    }

    #[test]
    fn definition_type_field_maps_to_kind() {
        let json = r#"{"filePath":"a.rs","name":"main","type":"function","content":"fn main(){}",
            "position":{"startLine":1,"startColumn":0,"endLine":1,"endColumn":10}}"#;
        let def: Definition = serde_json::from_str(json).unwrap();
        assert_eq!(def.kind, "function");
    }

    #[test]
    fn envelope_tolerates_missing_data() {
        let env: ApiEnvelope<SemanticData> =
            serde_json::from_str(r#"{"code":1,"message":"no index"}"#).unwrap();
        assert!(env.data.is_none());
    }
}
