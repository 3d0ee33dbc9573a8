//! Storage layer: the multi-store router and the durable store backends.
//!
//! The router maps a domain tag to exactly one store handle. Domains are
//! isolated by construction - no operation can address more than one of
//! them, and there is no cross-domain exception path.

pub mod error;
pub mod file;
mod kv;
mod session;

use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

pub use error::{StorageError, StorageResult};
pub use kv::KvStore;
pub use session::SessionStateStore;

// ============================================================================
// Domain
// ============================================================================

/// Tag identifying one of the three logical data domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// Users and everything not owned by a more specific domain.
    Primary,
    /// Course catalog data.
    Courses,
    /// Transfer-articulation data.
    Transfers,
}

impl Domain {
    /// Canonical lowercase tag for this domain.
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Primary => "primary",
            Domain::Courses => "courses",
            Domain::Transfers => "transfers",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized domain tag.
#[derive(Debug, Error)]
#[error("unknown data domain: {0}")]
pub struct UnknownDomain(pub String);

impl FromStr for Domain {
    type Err = UnknownDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(Domain::Primary),
            "courses" => Ok(Domain::Courses),
            "transfers" => Ok(Domain::Transfers),
            other => Err(UnknownDomain(other.to_string())),
        }
    }
}

// ============================================================================
// Store Router
// ============================================================================

/// Read-only routing table from domain tag to store handle.
///
/// Built once at process start as part of the binding set; cheap to clone.
#[derive(Clone)]
pub struct StoreRouter {
    primary: Arc<dyn KvStore>,
    courses: Arc<dyn KvStore>,
    transfers: Arc<dyn KvStore>,
}

impl StoreRouter {
    pub fn new(
        primary: Arc<dyn KvStore>,
        courses: Arc<dyn KvStore>,
        transfers: Arc<dyn KvStore>,
    ) -> Self {
        Self {
            primary,
            courses,
            transfers,
        }
    }

    /// Resolve a domain to its store handle.
    pub fn resolve(&self, domain: Domain) -> Arc<dyn KvStore> {
        match domain {
            Domain::Primary => self.primary.clone(),
            Domain::Courses => self.courses.clone(),
            Domain::Transfers => self.transfers.clone(),
        }
    }

    /// Resolve a raw domain tag to its store handle.
    pub fn resolve_tag(&self, tag: &str) -> Result<Arc<dyn KvStore>, UnknownDomain> {
        Ok(self.resolve(tag.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::file::FileKvStore;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_router(tmp: &TempDir) -> StoreRouter {
        StoreRouter::new(
            Arc::new(FileKvStore::new(tmp.path().join("primary"))),
            Arc::new(FileKvStore::new(tmp.path().join("courses"))),
            Arc::new(FileKvStore::new(tmp.path().join("transfers"))),
        )
    }

    #[test]
    fn domain_parse_roundtrip() {
        for domain in [Domain::Primary, Domain::Courses, Domain::Transfers] {
            assert_eq!(domain.as_str().parse::<Domain>().unwrap(), domain);
        }
    }

    #[test]
    fn unknown_domain_tag_rejected() {
        let err = "billing".parse::<Domain>().unwrap_err();
        assert_eq!(err.0, "billing");
    }

    #[tokio::test]
    async fn domains_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let router = test_router(&tmp);

        router
            .resolve(Domain::Courses)
            .put("cs101", &json!({"title": "Intro"}))
            .await
            .unwrap();

        // Same key, different domain: not visible.
        assert!(router
            .resolve(Domain::Primary)
            .get("cs101")
            .await
            .unwrap()
            .is_none());
        assert!(router
            .resolve(Domain::Courses)
            .get("cs101")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn resolve_tag_rejects_unknown() {
        let tmp = TempDir::new().unwrap();
        let router = test_router(&tmp);

        assert!(router.resolve_tag("courses").is_ok());
        assert!(router.resolve_tag("everything").is_err());
    }
}
