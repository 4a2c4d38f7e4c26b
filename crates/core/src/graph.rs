//! Transitive dependency resolution.
//!
//! The resolver walks the dependency tree depth-first, fetching each source
//! as it is first encountered and recursing into the union of a dependency's
//! own manifest entries and any siblings bridged in through
//! `extra_dependencies`. Nodes are memoised by name; revisiting a name checks
//! strict source equality instead of re-resolving.
//!
//! The finished graph is an arena (`Vec<ResolvedNode>` plus a name index):
//! diamond dependencies are legal when sources match, so nodes are shared
//! rather than owned by their parents. The post-order visit sequence doubles
//! as the leaf-first topological order the dependency builder consumes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace};

use crate::fetch::{self, FetchContext};
use crate::manifest::{Dependency, MANIFEST_FILENAME, Manifest, ResolveOptions};

/// Errors detected while walking the graph itself.
///
/// Fetch and manifest failures inside the walk surface as their own
/// [`crate::Error`] variants.
#[derive(Debug, Error)]
pub enum GraphError {
  #[error("dependency cycle detected: {chain}")]
  Cycle { chain: String },

  #[error("conflicting sources for dependency '{name}': {first} vs {second}")]
  Conflict {
    name: String,
    first: String,
    second: String,
  },

  #[error("dependency '{parent}' bridges '{name}', which is not declared in its scope")]
  UnknownBridge { parent: String, name: String },
}

/// One resolved node of the dependency DAG.
#[derive(Debug, Clone)]
pub struct ResolvedNode {
  pub name: String,
  /// The dependency record as declared (post override-merge).
  pub dep: Dependency,
  /// Absolute on-disk source directory.
  pub path: PathBuf,
  /// Git commit SHA, URL hash, or `"local"`.
  pub resolved: String,
  /// Names of this node's children (manifest deps plus bridged siblings).
  pub children: Vec<String>,
  /// The dependency's own manifest, when it is itself a flappy project.
  pub manifest: Option<Manifest>,
}

/// The fully resolved dependency graph.
#[derive(Debug, Default)]
pub struct DependencyGraph {
  nodes: Vec<ResolvedNode>,
  index: HashMap<String, usize>,
  /// Indices into `nodes`, leaf-first.
  order: Vec<usize>,
}

impl DependencyGraph {
  pub fn get(&self, name: &str) -> Option<&ResolvedNode> {
    self.index.get(name).map(|&i| &self.nodes[i])
  }

  /// Nodes in topological (leaf-first) order: every child precedes its parents.
  pub fn topological(&self) -> impl Iterator<Item = &ResolvedNode> {
    self.order.iter().map(|&i| &self.nodes[i])
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }
}

/// Resolve the manifest's dependency list into a [`DependencyGraph`].
pub fn resolve(
  manifest: &Manifest,
  project_dir: &Path,
  fetch_ctx: &FetchContext,
  opts: &ResolveOptions,
) -> crate::Result<DependencyGraph> {
  let mut resolver = Resolver {
    project_dir,
    fetch_ctx,
    opts,
    graph: DependencyGraph::default(),
    path: Vec::new(),
  };

  let roots = &manifest.dependencies;
  for dep in roots {
    resolver.visit(dep, roots)?;
  }

  debug!(nodes = resolver.graph.len(), "dependency graph resolved");
  Ok(resolver.graph)
}

struct Resolver<'a> {
  project_dir: &'a Path,
  fetch_ctx: &'a FetchContext,
  opts: &'a ResolveOptions,
  graph: DependencyGraph,
  /// Names on the current ancestor chain, for cycle detection.
  path: Vec<String>,
}

impl Resolver<'_> {
  /// Visit `dep`, declared among the sibling list `scope`.
  ///
  /// `scope` is where the names in `dep.extra_dependencies` are looked up:
  /// bridging lets a parent hand its own siblings to a raw library that
  /// cannot declare them itself.
  fn visit(&mut self, dep: &Dependency, scope: &[Dependency]) -> crate::Result<()> {
    if self.path.contains(&dep.name) {
      let mut chain = self.path.join(" -> ");
      chain.push_str(" -> ");
      chain.push_str(&dep.name);
      return Err(GraphError::Cycle { chain }.into());
    }

    if let Some(existing) = self.graph.get(&dep.name) {
      if existing.dep.source != dep.source {
        return Err(
          GraphError::Conflict {
            name: dep.name.clone(),
            first: existing.dep.source.to_string(),
            second: dep.source.to_string(),
          }
          .into(),
        );
      }
      trace!(name = %dep.name, "already resolved");
      return Ok(());
    }

    let fetched = fetch::fetch(dep, self.project_dir, self.fetch_ctx)?;

    let manifest = if fetched.path.join(MANIFEST_FILENAME).exists() {
      Some(Manifest::load(&fetched.path, self.opts)?)
    } else {
      None
    };
    let native: Vec<Dependency> = manifest.as_ref().map(|m| m.dependencies.clone()).unwrap_or_default();

    self.path.push(dep.name.clone());

    let mut children: Vec<String> = Vec::new();
    for child in &native {
      children.push(child.name.clone());
      self.visit(child, &native)?;
    }
    for bridged in &dep.extra_dependencies {
      if children.iter().any(|c| c == bridged) {
        continue;
      }
      let Some(sibling) = scope.iter().find(|d| d.name == *bridged) else {
        self.path.pop();
        return Err(
          GraphError::UnknownBridge {
            parent: dep.name.clone(),
            name: bridged.clone(),
          }
          .into(),
        );
      };
      children.push(sibling.name.clone());
      self.visit(sibling, scope)?;
    }

    self.path.pop();

    trace!(name = %dep.name, resolved = %fetched.resolved, "resolved dependency");
    let idx = self.graph.nodes.len();
    self.graph.nodes.push(ResolvedNode {
      name: dep.name.clone(),
      dep: dep.clone(),
      path: fetched.path,
      resolved: fetched.resolved,
      children,
      manifest,
    });
    self.graph.index.insert(dep.name.clone(), idx);
    self.graph.order.push(idx);
    Ok(())
  }
}
