//! Document Binding (§4.13): session-scoped reference text for prompts.
//! Grounded on `original_source/core/document/session_binding.py`'s
//! `get_session_document_context`. Document upload/parsing/OCR are external
//! collaborators per scope; this binds already-parsed text to a session.

use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct BoundDocument {
    original_filename: String,
    parsed_text: String,
    attached_at: chrono::DateTime<chrono::Utc>,
}

/// In-memory session→document binding. Exposes the one method the engine
/// consumes (`get_session_document_context`) plus the attach/list surface
/// `noesis-api`'s HTTP layer needs to populate it.
#[derive(Default)]
pub struct SessionDocumentStore {
    documents: RwLock<HashMap<String, Vec<BoundDocument>>>,
}

impl SessionDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds one already-parsed document to a session; most-recent first.
    pub fn attach(&self, session_id: &str, original_filename: impl Into<String>, parsed_text: impl Into<String>) {
        let doc = BoundDocument {
            original_filename: original_filename.into(),
            parsed_text: parsed_text.into(),
            attached_at: chrono::Utc::now(),
        };
        let mut documents = self.documents.write().expect("session document store lock poisoned");
        let entry = documents.entry(session_id.to_string()).or_default();
        entry.push(doc);
        entry.sort_by(|a, b| b.attached_at.cmp(&a.attached_at));
    }

    /// Concatenates every document bound to a session into reference text,
    /// each truncated and labelled, separated by a horizontal rule. Never
    /// fails; returns an empty string when no documents are bound.
    pub fn get_session_document_context(&self, session_id: &str, max_chars_per_doc: usize, max_total_chars: usize) -> String {
        let documents = self.documents.read().expect("session document store lock poisoned");
        let Some(docs) = documents.get(session_id) else {
            return String::new();
        };

        let mut parts = Vec::new();
        let mut total = 0usize;
        for doc in docs {
            if total >= max_total_chars {
                break;
            }
            let text = doc.parsed_text.trim();
            if text.is_empty() {
                continue;
            }
            let truncated = if text.chars().count() > max_chars_per_doc {
                format!("{}\n...[已截断]", text.chars().take(max_chars_per_doc).collect::<String>())
            } else {
                text.to_string()
            };
            total += truncated.chars().count();
            parts.push(format!("【文档：{}】\n{}", doc.original_filename, truncated));
        }

        parts.join("\n\n---\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_session_returns_empty_string() {
        let store = SessionDocumentStore::new();
        assert_eq!(store.get_session_document_context("s1", 8000, 20000), "");
    }

    #[test]
    fn single_document_is_labelled_with_original_filename() {
        let store = SessionDocumentStore::new();
        store.attach("s1", "brief.docx", "品牌策略简报内容");
        let context = store.get_session_document_context("s1", 8000, 20000);
        assert!(context.starts_with("【文档：brief.docx】"));
        assert!(context.contains("品牌策略简报内容"));
    }

    #[test]
    fn multiple_documents_are_joined_by_horizontal_rule() {
        let store = SessionDocumentStore::new();
        store.attach("s1", "a.txt", "第一份文档");
        store.attach("s1", "b.txt", "第二份文档");
        let context = store.get_session_document_context("s1", 8000, 20000);
        assert!(context.contains("\n\n---\n\n"));
    }

    #[test]
    fn per_document_truncation_appends_marker() {
        let store = SessionDocumentStore::new();
        store.attach("s1", "big.txt", "字".repeat(100));
        let context = store.get_session_document_context("s1", 10, 20000);
        assert!(context.contains("...[已截断]"));
    }

    #[test]
    fn blank_documents_are_skipped() {
        let store = SessionDocumentStore::new();
        store.attach("s1", "empty.txt", "   ");
        assert_eq!(store.get_session_document_context("s1", 8000, 20000), "");
    }
}
