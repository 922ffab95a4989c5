//! Read-only GraphRAG export: loader and substring lookup.
//!
//! The export is two JSON documents (`graph.json`, `communities.json`)
//! produced by an offline indexing pipeline. Absence is a valid state:
//! every lookup then returns empty. Matching is case-insensitive
//! substring containment with no ranking — first match in load order
//! wins and the scan stops once the cap is reached.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Max characters of a community summary used as a grounding snippet.
const SUMMARY_SNIPPET_CAP: usize = 500;
/// Max characters of a node title used as a grounding snippet.
const TITLE_SNIPPET_CAP: usize = 140;
/// Max characters of a summary returned by the community endpoint.
const COMMUNITY_SUMMARY_CAP: usize = 280;

/// Deserialize an id that the export may emit as a string or a number.
fn de_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(String::new()),
        Some(serde_json::Value::String(s)) => Ok(s),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {:?}",
            other
        ))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    #[serde(default, deserialize_with = "de_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    #[serde(default, deserialize_with = "de_string_or_number")]
    pub source: String,
    #[serde(default, deserialize_with = "de_string_or_number")]
    pub target: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphDoc {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Community {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommunityDoc {
    #[serde(default)]
    pub communities: Vec<Community>,
}

/// Process-wide, read-only view of the graph export.
#[derive(Debug, Default)]
pub struct GraphIndex {
    dir: PathBuf,
    graph: Option<GraphDoc>,
    communities: Option<CommunityDoc>,
}

impl GraphIndex {
    /// Load the export from a directory. Missing or malformed files are
    /// tolerated: the affected document stays absent and lookups over it
    /// return empty.
    pub fn load(dir: &Path) -> Self {
        let graph = read_doc::<GraphDoc>(&dir.join("graph.json"));
        let communities = read_doc::<CommunityDoc>(&dir.join("communities.json"));

        if graph.is_some() || communities.is_some() {
            info!("GraphRAG export loaded from {}", dir.display());
        } else {
            warn!(
                "GraphRAG export not found at {} — graph lookups will return empty",
                dir.display()
            );
        }

        Self {
            dir: dir.to_path_buf(),
            graph,
            communities,
        }
    }

    /// An index with no export; every lookup returns empty.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.graph.is_some() || self.communities.is_some()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Grounding snippets for a query: community summaries first, then
    /// node titles while fewer than `max` found. No scoring.
    pub fn lookup(&self, query: &str, max: usize) -> Vec<String> {
        if query.trim().is_empty() || !self.is_loaded() || max == 0 {
            return Vec::new();
        }

        let q = query.to_lowercase();
        let mut snippets = Vec::new();

        if let Some(doc) = &self.communities {
            for community in &doc.communities {
                if snippets.len() >= max {
                    break;
                }
                let hay = format!("{} {}", community.title, community.summary).to_lowercase();
                if hay.contains(&q) {
                    let text = if community.summary.is_empty() {
                        &community.title
                    } else {
                        &community.summary
                    };
                    snippets.push(truncate_chars(text, SUMMARY_SNIPPET_CAP));
                }
            }
        }

        if snippets.len() < max {
            if let Some(doc) = &self.graph {
                for node in &doc.nodes {
                    if snippets.len() >= max {
                        break;
                    }
                    if node.title.to_lowercase().contains(&q) {
                        snippets.push(truncate_chars(&node.title, TITLE_SNIPPET_CAP));
                    }
                }
            }
        }

        snippets
    }

    /// Up to three community summaries matching the query, for the
    /// community endpoint. An empty query matches everything.
    pub fn community_summaries(&self, query: &str) -> Vec<String> {
        let Some(doc) = &self.communities else {
            return Vec::new();
        };

        let q = query.to_lowercase();
        doc.communities
            .iter()
            .filter(|c| {
                c.title.to_lowercase().contains(&q) || c.summary.to_lowercase().contains(&q)
            })
            .take(3)
            .map(|c| {
                let text = if c.summary.is_empty() { &c.title } else { &c.summary };
                truncate_chars(text, COMMUNITY_SUMMARY_CAP)
            })
            .collect()
    }

    /// Nodes whose title contains the query plus every edge touching a
    /// matched node.
    pub fn subgraph(&self, query: &str) -> (Vec<GraphNode>, Vec<GraphEdge>) {
        let Some(doc) = &self.graph else {
            return (Vec::new(), Vec::new());
        };

        let q = query.to_lowercase();
        let nodes: Vec<GraphNode> = doc
            .nodes
            .iter()
            .filter(|n| n.title.to_lowercase().contains(&q))
            .cloned()
            .collect();

        let ids: std::collections::HashSet<&str> =
            nodes.iter().map(|n| n.id.as_str()).collect();
        let edges: Vec<GraphEdge> = doc
            .edges
            .iter()
            .filter(|e| ids.contains(e.source.as_str()) || ids.contains(e.target.as_str()))
            .cloned()
            .collect();

        (nodes, edges)
    }

    /// Element counts for the debug endpoint.
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self.graph.as_ref().map(|g| g.nodes.len()).unwrap_or(0),
            edges: self.graph.as_ref().map(|g| g.edges.len()).unwrap_or(0),
            communities: self
                .communities
                .as_ref()
                .map(|c| c.communities.len())
                .unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub communities: usize,
}

fn read_doc<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(doc) => Some(doc),
        Err(err) => {
            warn!("Failed to parse {}: {}", path.display(), err);
            None
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
