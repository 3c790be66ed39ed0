// Copyright 2025 Finstore Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Logical path resolution shared by every backend

use crate::error::{Result, StoreError};

/// Segment substituted with the authenticated principal's id at resolution
/// time, e.g. `users/{owner}/transactions`.
pub const OWNER_PLACEHOLDER: &str = "{owner}";

/// A resolved, backend-neutral address.
///
/// Paths follow the hierarchical convention: an odd number of segments
/// addresses a collection, an even number a document. Flat backends use the
/// leaf collection name; the realtime backend keys collections by the full
/// hierarchical prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    segments: Vec<String>,
}

impl ResolvedPath {
    pub fn is_document(&self) -> bool {
        self.segments.len() % 2 == 0
    }

    /// Document id, when this path addresses a document.
    pub fn doc_id(&self) -> Option<&str> {
        if self.is_document() {
            self.segments.last().map(String::as_str)
        } else {
            None
        }
    }

    /// Leaf collection name, used by backends with a flat address space.
    pub fn collection(&self) -> &str {
        let idx = if self.is_document() {
            self.segments.len() - 2
        } else {
            self.segments.len() - 1
        };
        &self.segments[idx]
    }

    /// Full collection prefix, used by backends with hierarchical
    /// sub-collections. For `users/alice/transactions/t1` this is
    /// `users/alice/transactions`.
    pub fn collection_key(&self) -> String {
        let end = if self.is_document() {
            self.segments.len() - 1
        } else {
            self.segments.len()
        };
        self.segments[..end].join("/")
    }

    /// The whole resolved path, as a REST resource path.
    pub fn as_resource(&self) -> String {
        self.segments.join("/")
    }
}

/// Resolve a logical path against the current principal.
///
/// Fails with `NotAuthenticated` when the path carries the owner placeholder
/// and no principal is available, and with `InvalidPath` for empty or
/// traversal-prone segments.
pub fn resolve(path: &str, owner: Option<&str>) -> Result<ResolvedPath> {
    if path.is_empty() {
        return Err(StoreError::InvalidPath("empty path".to_string()));
    }

    let mut segments = Vec::new();
    for segment in path.split('/') {
        if segment.is_empty() {
            return Err(StoreError::InvalidPath(format!(
                "empty segment in '{path}'"
            )));
        }
        if segment == "." || segment == ".." {
            return Err(StoreError::InvalidPath(format!(
                "illegal segment '{segment}' in '{path}'"
            )));
        }
        if segment == OWNER_PLACEHOLDER {
            let owner = owner.ok_or_else(|| {
                StoreError::NotAuthenticated(format!(
                    "path '{path}' requires an authenticated principal"
                ))
            })?;
            segments.push(owner.to_string());
        } else {
            segments.push(segment.to_string());
        }
    }

    Ok(ResolvedPath { segments })
}

/// Resolve a path that must address a document.
pub fn resolve_document(path: &str, owner: Option<&str>) -> Result<ResolvedPath> {
    let resolved = resolve(path, owner)?;
    if !resolved.is_document() {
        return Err(StoreError::InvalidPath(format!(
            "'{path}' addresses a collection, expected a document"
        )));
    }
    Ok(resolved)
}

/// Resolve a path that must address a collection.
pub fn resolve_collection(path: &str, owner: Option<&str>) -> Result<ResolvedPath> {
    let resolved = resolve(path, owner)?;
    if resolved.is_document() {
        return Err(StoreError::InvalidPath(format!(
            "'{path}' addresses a document, expected a collection"
        )));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_path() {
        let p = resolve("transactions", None).unwrap();
        assert!(!p.is_document());
        assert_eq!(p.collection(), "transactions");
        assert_eq!(p.collection_key(), "transactions");
        assert_eq!(p.doc_id(), None);
    }

    #[test]
    fn test_document_path() {
        let p = resolve("transactions/t1", None).unwrap();
        assert!(p.is_document());
        assert_eq!(p.collection(), "transactions");
        assert_eq!(p.doc_id(), Some("t1"));
    }

    #[test]
    fn test_owner_substitution() {
        let p = resolve("users/{owner}/transactions", Some("alice")).unwrap();
        assert_eq!(p.collection(), "transactions");
        assert_eq!(p.collection_key(), "users/alice/transactions");
        assert_eq!(p.as_resource(), "users/alice/transactions");
    }

    #[test]
    fn test_owner_without_principal() {
        let err = resolve("users/{owner}", None).unwrap_err();
        assert!(matches!(err, StoreError::NotAuthenticated(_)));
    }

    #[test]
    fn test_subcollection_document() {
        let p = resolve("users/alice/transactions/t9", None).unwrap();
        assert!(p.is_document());
        assert_eq!(p.collection_key(), "users/alice/transactions");
        assert_eq!(p.doc_id(), Some("t9"));
    }

    #[test]
    fn test_invalid_segments() {
        assert!(resolve("", None).is_err());
        assert!(resolve("a//b", None).is_err());
        assert!(resolve("a/../b", None).is_err());
    }

    #[test]
    fn test_shape_checks() {
        assert!(resolve_document("transactions", None).is_err());
        assert!(resolve_collection("transactions/t1", None).is_err());
    }
}
