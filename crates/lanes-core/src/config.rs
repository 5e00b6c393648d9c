use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::projector::SortOrder;

pub const DEFAULT_API_URL: &str =
  "http://localhost:8000";
const API_URL_ENV_VAR: &str =
  "LANES_API_URL";
const LANESRC_ENV_VAR: &str =
  "LANESRC";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    map.insert(
      "api.url".to_string(),
      DEFAULT_API_URL.to_string()
    );
    map.insert(
      "sort".to_string(),
      SortOrder::default().to_string()
    );
    map.insert(
      "color".to_string(),
      "on".to_string()
    );
    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    lanesrc_override
  ))]
  pub fn load(
    lanesrc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let lanesrc = resolve_lanesrc_path(
      lanesrc_override
    )?;
    if let Some(path) = lanesrc {
      info!(lanesrc = %path.display(), "loading lanesrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no lanesrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  /// Backend base URL; the
  /// `LANES_API_URL` environment
  /// variable beats the rc file.
  pub fn api_url(&self) -> String {
    if let Ok(raw) =
      std::env::var(API_URL_ENV_VAR)
    {
      let trimmed = raw.trim();
      if !trimmed.is_empty() {
        return trimmed.to_string();
      }
    }

    self
      .get("api.url")
      .unwrap_or_else(|| {
        DEFAULT_API_URL.to_string()
      })
  }

  pub fn sort_order(
    &self
  ) -> anyhow::Result<SortOrder> {
    match self.get("sort") {
      | Some(raw) => raw
        .parse::<SortOrder>()
        .context(
          "invalid `sort` setting"
        ),
      | None => Ok(SortOrder::default())
    }
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once(" #")
      {
        line = before.trim();
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if self
          .loaded_files
          .contains(&include_path)
        {
          warn!(include = %include_path.display(), "include already loaded; skipping cycle");
        } else if include_path.exists()
        {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_lanesrc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(lanesrc_env) =
    std::env::var(LANESRC_ENV_VAR)
  {
    if lanesrc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      lanesrc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping ~/.lanesrc"
    );
    return Ok(None);
  };
  let candidate = home.join(".lanesrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
