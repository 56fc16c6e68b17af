//! Cache keys and `Cacheable` implementations for tracker types.

use std::fmt;

use crate::cache::Cacheable;

use super::types::Issue;

impl Cacheable for Issue {
  fn cache_key(&self) -> String {
    CacheKey::Issue(&self.reference).to_string()
  }
}

/// Every key the tracker components read or write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheKey<'a> {
  /// Full issue record, by reference
  Issue(&'a str),
  /// Reference -> remote id
  LinkageByRef(&'a str),
  /// Remote id -> reference
  LinkageById(&'a str),
  /// Memo of the last full walk, per scope
  FetchAll { global: bool },
}

impl fmt::Display for CacheKey<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Issue(reference) => write!(f, "issues/{}", reference),
      Self::LinkageByRef(reference) => write!(f, "linkages/byRef/issues/{}", reference),
      Self::LinkageById(id) => write!(f, "linkages/byId/issues/{}", id),
      Self::FetchAll { global: false } => write!(f, "workers/issues/fetchAll"),
      Self::FetchAll { global: true } => write!(f, "workers/issues/fetchAll/global"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_key_layout() {
    assert_eq!(CacheKey::Issue("ABC-1").to_string(), "issues/ABC-1");
    assert_eq!(
      CacheKey::LinkageByRef("ABC-1").to_string(),
      "linkages/byRef/issues/ABC-1"
    );
    assert_eq!(
      CacheKey::LinkageById("555").to_string(),
      "linkages/byId/issues/555"
    );
    assert_eq!(
      CacheKey::FetchAll { global: false }.to_string(),
      "workers/issues/fetchAll"
    );
    assert_eq!(
      CacheKey::FetchAll { global: true }.to_string(),
      "workers/issues/fetchAll/global"
    );
  }
}
