//! Hierarchical override merge.
//!
//! The `[build]` table is merged from up to eight layers, later layers
//! overriding earlier ones:
//!
//! 1. `[build]`
//! 2. `[build.<mode>]`
//! 3. `[build.<profile>]` (only when a custom profile was requested)
//! 4. `[build.<profile>.<mode>]`
//! 5. `[build.<platform>]` and `[build.<platform>.<mode>]`
//! 6. `[build.<profile>.<platform>]` and `[build.<profile>.<platform>.<mode>]`
//!
//! Scalar fields are overwritten; `defines` and `flags` are appended.
//! Dependency tables use the analogous merge with their own field rules.

use flappy_platform::Arch;

use super::types::{BuildConfig, Dependency, Language, OutputKind, Source};
use super::{ConfigError, ResolveOptions, get_str, get_str_array};

/// The ordered override layers for one table, plus whether any platform or
/// profile layer matched.
struct Layers<'a> {
  tables: Vec<&'a toml::Table>,
  ctx: String,
  profile_defined: bool,
}

fn sub_table<'a>(table: &'a toml::Table, ctx: &str, key: &str) -> Result<Option<&'a toml::Table>, ConfigError> {
  match table.get(key) {
    None => Ok(None),
    Some(toml::Value::Table(t)) => Ok(Some(t)),
    Some(_) => Err(ConfigError::TypeMismatch {
      table: ctx.to_string(),
      field: key.to_string(),
      expected: "table",
    }),
  }
}

fn collect_build_layers<'a>(base: &'a toml::Table, opts: &ResolveOptions) -> Result<Layers<'a>, ConfigError> {
  let ctx = "build".to_string();
  let mode = opts.profile.as_str();
  let platform = opts.os.as_str();

  let mut tables = vec![base];
  let mut profile_defined = false;

  if let Some(t) = sub_table(base, &ctx, mode)? {
    tables.push(t);
  }

  let profile_table = match &opts.custom_profile {
    Some(name) => {
      let t = sub_table(base, &ctx, name)?.ok_or_else(|| ConfigError::UnknownProfile(name.clone()))?;
      profile_defined = true;
      tables.push(t);
      if let Some(tm) = sub_table(t, &ctx, mode)? {
        tables.push(tm);
      }
      Some(t)
    }
    None => None,
  };

  if let Some(pt) = sub_table(base, &ctx, platform)? {
    profile_defined = true;
    tables.push(pt);
    if let Some(ptm) = sub_table(pt, &ctx, mode)? {
      tables.push(ptm);
    }
  }

  if let Some(prof) = profile_table
    && let Some(pt) = sub_table(prof, &ctx, platform)?
  {
    profile_defined = true;
    tables.push(pt);
    if let Some(ptm) = sub_table(pt, &ctx, mode)? {
      tables.push(ptm);
    }
  }

  Ok(Layers {
    tables,
    ctx,
    profile_defined,
  })
}

fn collect_dependency_layers<'a>(
  name: &str,
  base: &'a toml::Table,
  opts: &ResolveOptions,
) -> Result<Layers<'a>, ConfigError> {
  let ctx = format!("dependencies.{}", name);
  let mode = opts.profile.as_str();
  let platform = opts.os.as_str();

  let mut tables = vec![base];
  if let Some(t) = sub_table(base, &ctx, mode)? {
    tables.push(t);
  }
  if let Some(pt) = sub_table(base, &ctx, platform)? {
    tables.push(pt);
    if let Some(ptm) = sub_table(pt, &ctx, mode)? {
      tables.push(ptm);
    }
  }

  Ok(Layers {
    tables,
    ctx,
    profile_defined: false,
  })
}

impl<'a> Layers<'a> {
  /// Scalar merge: the last layer that defines `key` wins.
  fn scalar(&self, key: &str) -> Result<Option<String>, ConfigError> {
    let mut result = None;
    for table in &self.tables {
      if let Some(value) = get_str(table, &self.ctx, key)? {
        result = Some(value);
      }
    }
    Ok(result)
  }

  /// List merge: entries from every layer are appended in layer order.
  fn appended(&self, key: &str) -> Result<Vec<String>, ConfigError> {
    let mut result = Vec::new();
    for table in &self.tables {
      if let Some(items) = get_str_array(table, &self.ctx, key)? {
        result.extend(items);
      }
    }
    Ok(result)
  }

  /// Whole-list overwrite: the last layer that defines `key` replaces it.
  fn replaced(&self, key: &str) -> Result<Option<Vec<String>>, ConfigError> {
    let mut result = None;
    for table in &self.tables {
      if let Some(items) = get_str_array(table, &self.ctx, key)? {
        result = Some(items);
      }
    }
    Ok(result)
  }

  fn required(&self, key: &'static str) -> Result<String, ConfigError> {
    self.scalar(key)?.ok_or(ConfigError::MissingField {
      table: self.ctx.clone(),
      field: key,
    })
  }
}

pub(crate) fn resolve_build(base: &toml::Table, opts: &ResolveOptions) -> Result<BuildConfig, ConfigError> {
  let layers = collect_build_layers(base, opts)?;

  let compiler = layers.required("compiler")?;
  let standard = layers.required("standard")?;
  let output = layers.required("output")?;

  let language = match layers.scalar("language")?.as_deref() {
    None | Some("c++") | Some("cpp") => Language::Cpp,
    Some("c") => Language::C,
    Some(other) => {
      return Err(ConfigError::InvalidValue {
        table: layers.ctx.clone(),
        field: "language",
        value: other.to_string(),
      });
    }
  };

  let arch = match layers.scalar("arch")? {
    Some(token) => token.parse::<Arch>().map_err(|_| ConfigError::InvalidValue {
      table: layers.ctx.clone(),
      field: "arch",
      value: token.clone(),
    })?,
    None => opts.host_arch,
  };

  let kind = match layers.scalar("type")?.as_deref() {
    None | Some("exe") => OutputKind::Executable,
    Some("lib") | Some("static") => OutputKind::StaticLib,
    Some("dll") | Some("shared") | Some("dynamic") => OutputKind::SharedLib,
    Some(other) => {
      return Err(ConfigError::InvalidValue {
        table: layers.ctx.clone(),
        field: "type",
        value: other.to_string(),
      });
    }
  };

  Ok(BuildConfig {
    compiler,
    language,
    standard,
    output: output.into(),
    arch,
    kind,
    defines: layers.appended("defines")?,
    flags: layers.appended("flags")?,
    profile_defined: layers.profile_defined,
  })
}

pub(crate) fn resolve_dependency(
  name: &str,
  base: &toml::Table,
  opts: &ResolveOptions,
) -> Result<Dependency, ConfigError> {
  let layers = collect_dependency_layers(name, base, opts)?;

  let git = layers.scalar("git")?;
  let url = layers.scalar("url")?;
  let path = layers.scalar("path")?;

  let declared = [git.is_some(), url.is_some(), path.is_some()].iter().filter(|p| **p).count();
  if declared == 0 {
    return Err(ConfigError::NoSource(name.to_string()));
  }
  if declared > 1 {
    return Err(ConfigError::MultipleSources(name.to_string()));
  }

  let source = if let Some(url) = git {
    Source::Git {
      url,
      tag: layers.scalar("tag")?,
    }
  } else if let Some(url) = url {
    Source::Http { url }
  } else {
    Source::Local {
      path: path.expect("one source is declared").into(),
    }
  };

  Ok(Dependency {
    name: name.to_string(),
    source,
    defines: layers.appended("defines")?,
    build_cmd: layers.scalar("build_cmd")?,
    include_dirs: layers.replaced("include_dirs")?,
    lib_dirs: layers.replaced("lib_dirs")?,
    libs: layers.replaced("libs")?,
    extra_dependencies: layers.appended("extra_dependencies")?,
  })
}
