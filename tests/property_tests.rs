//! Property-based tests for scope chains, resolution order and names.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use std::sync::Arc;

use proptest::prelude::*;

use pipeline_defaults::core::document::{Document, Scope};
use pipeline_defaults::core::folders::{PathTopology, Project};
use pipeline_defaults::core::types::{ContainerId, DocumentName};
use pipeline_defaults::discovery::wildcard_match;
use pipeline_defaults::resolve::{
    DefaultDefinitionResolver, Resolution, ScopeChain, ScopeChainError,
};
use pipeline_defaults::store::MemoryConfigStore;

/// Strategy for one folder path component.
fn component() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9_-]{0,7}"
}

/// Strategy for folder paths of 1 to 8 components.
fn folder_path() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(component(), 1..8)
}

fn project_in(path: &[String]) -> Project {
    let folder = ContainerId::new(path.join("/")).unwrap();
    Project::new("p", Some(folder)).unwrap()
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    /// The chain is the project's folder, then each ancestor, then global once.
    #[test]
    fn chain_walks_ancestors_then_global(path in folder_path()) {
        let project = project_in(&path);
        let chain = ScopeChain::compute(&project, &PathTopology).unwrap();

        prop_assert_eq!(chain.len(), path.len() + 1);
        prop_assert_eq!(chain.scopes().last(), Some(&Scope::Global));
        prop_assert_eq!(chain.iter().filter(|s| s.is_global()).count(), 1);

        for (i, scope) in chain.scopes()[..path.len()].iter().enumerate() {
            let expected = path[..path.len() - i].join("/");
            prop_assert_eq!(scope.container_id().map(|c| c.as_str()), Some(expected.as_str()));
        }
    }

    /// A depth limit below the folder depth fails; at or above it succeeds.
    #[test]
    fn depth_limit_is_exact(path in folder_path()) {
        let project = project_in(&path);
        let depth = path.len();

        prop_assert!(ScopeChain::compute_with_limit(&project, &PathTopology, depth).is_ok());
        let short = ScopeChain::compute_with_limit(&project, &PathTopology, depth - 1);
        let is_depth_exceeded = matches!(short, Err(ScopeChainError::DepthExceeded { .. }));
        prop_assert!(is_depth_exceeded);
    }

    /// Resolution returns the first scope in chain order holding the name.
    #[test]
    fn first_scope_with_document_wins(
        path in folder_path(),
        mask in prop::collection::vec(any::<bool>(), 9),
    ) {
        let project = project_in(&path);
        let chain = ScopeChain::compute(&project, &PathTopology).unwrap();
        let holders: Vec<Scope> = chain
            .iter()
            .zip(mask.iter())
            .filter(|(_, has)| **has)
            .map(|(scope, _)| scope.clone())
            .collect();

        let store = MemoryConfigStore::with_documents(holders.iter().map(|scope| {
            Document::new(scope.clone(), DocumentName::jenkinsfile(), scope.to_string())
        }));
        let resolver = DefaultDefinitionResolver::new(Arc::new(store), Arc::new(PathTopology));

        let resolution =
            block_on(resolver.resolve(&project, &DocumentName::jenkinsfile())).unwrap();

        match holders.first() {
            Some(first) => {
                let found = resolution.found().unwrap();
                prop_assert_eq!(found.source_scope(), first);
                prop_assert_eq!(found.document().content(), first.to_string());
            }
            None => prop_assert_eq!(resolution, Resolution::Absent),
        }
    }

    /// Names made of safe characters are accepted, anything with a slash is not.
    #[test]
    fn document_names(name in "[A-Za-z0-9_.-]{1,20}", prefix in "[a-z]{0,5}") {
        if name != "." && name != ".." {
            prop_assert!(DocumentName::new(name.as_str()).is_ok());
        }
        let with_slash = format!("{}/{}", prefix, name);
        prop_assert!(DocumentName::new(with_slash).is_err());
    }

    /// Container ids built from valid components keep their components.
    #[test]
    fn container_components(path in folder_path()) {
        let id = ContainerId::new(path.join("/")).unwrap();
        let components: Vec<&str> = id.components().collect();
        prop_assert_eq!(components, path.iter().map(String::as_str).collect::<Vec<_>>());
        prop_assert_eq!(id.leaf(), path.last().unwrap().as_str());
    }

    /// `*` matches anything; a literal matches only itself; `prefix*` matches extensions.
    #[test]
    fn wildcard_basics(name in "[a-z/_-]{0,16}", suffix in "[a-z]{0,6}") {
        prop_assert!(wildcard_match("*", &name));
        prop_assert!(wildcard_match(&name, &name));
        let prefixed = format!("{}*", name);
        let extended = format!("{}{}", name, suffix);
        prop_assert!(wildcard_match(&prefixed, &extended));
        if !suffix.is_empty() {
            prop_assert!(!wildcard_match(&name, &extended));
        }
    }
}
