//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

/// File names looked up in the project directory, first match wins
const PROJECT_FILES: [&str; 2] = ["fanout.toml", ".fanout.toml"];

/// Prefix of environment overrides
const ENV_PREFIX: &str = "FANOUT_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `FANOUT_` environment variables, `__` separating section and key
    /// 2. Explicit config path (if provided); a missing file is an error
    /// 3. Project root: `./fanout.toml` or `./.fanout.toml`
    /// 4. XDG config: `$XDG_CONFIG_HOME/fanout/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, Box<figment::Error>> {
        Self::load_from(
            Self::global_config_path(),
            Path::new("."),
            config_path,
            ENV_PREFIX,
        )
    }

    /// Load from explicit locations. `load` uses the real global path, the
    /// current directory and the `FANOUT_` prefix.
    pub fn load_from(
        global_path: Option<PathBuf>,
        project_dir: &Path,
        config_path: Option<&Path>,
        env_prefix: &str,
    ) -> Result<FileConfig, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        // Add global config (XDG or fallback)
        if let Some(global_path) = global_path
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(&global_path));
        }

        if let Some(path) = Self::find_project_config(project_dir) {
            figment = figment.merge(Toml::file(&path));
        }

        // Add explicit config path (highest priority for files)
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(Box::new(figment::Error::from(format!(
                    "config file not found: {}",
                    path.display()
                ))));
            }
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(env_prefix).split("__"));

        figment.extract().map_err(Box::new)
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path
    ///
    /// Returns XDG_CONFIG_HOME/fanout/config.toml if set,
    /// otherwise falls back to ~/.config/fanout/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("fanout").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        Self::find_project_config(Path::new("."))
    }

    fn find_project_config(dir: &Path) -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    /// Print the config file locations being used (for debugging)
    pub fn print_config_sources(config_path: Option<&Path>) {
        println!("Configuration sources (in priority order):");
        println!("  [     ] Env:     {}<SECTION>__<KEY>", ENV_PREFIX);

        if let Some(path) = config_path {
            let mark = if path.exists() { "FOUND" } else { "MISSING" };
            println!("  [{:<5}] Explicit: {}", mark, path.display());
        }

        // Project config
        if let Some(path) = Self::project_config_path() {
            println!("  [FOUND] Project: {}", path.display());
        } else {
            println!("  [     ] Project: ./fanout.toml or ./.fanout.toml");
        }

        // Global config
        if let Some(path) = Self::global_config_path() {
            if path.exists() {
                println!("  [FOUND] Global:  {}", path.display());
            } else {
                println!("  [     ] Global:  {}", path.display());
            }
        }

        println!("  [     ] Default: built-in defaults");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// No variable in the test environment carries this prefix
    const NO_ENV: &str = "FANOUT_LOADER_TEST_UNUSED_";

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.limits.max_concurrent_iterations, 3);
        assert!(config.completion.wait_for_all);
    }

    #[test]
    fn test_global_config_path_returns_some() {
        // Should return a path (even if file doesn't exist)
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("fanout"));
    }

    #[test]
    fn test_empty_sources_give_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::load_from(None, dir.path(), None, NO_ENV).unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_layering() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.toml");
        fs::write(
            &global,
            "[limits]\nmax_concurrent_iterations = 5\nmax_total_iterations = 20\n",
        )
        .unwrap();

        let project_dir = dir.path().join("project");
        fs::create_dir(&project_dir).unwrap();
        fs::write(
            project_dir.join(".fanout.toml"),
            "[limits]\nmax_concurrent_iterations = 4\n\n[runner]\naggregation = \"voting\"\n",
        )
        .unwrap();

        let explicit = dir.path().join("explicit.toml");
        fs::write(&explicit, "[runner]\naggregation = \"consensus\"\n").unwrap();

        let config =
            ConfigLoader::load_from(Some(global), &project_dir, Some(&explicit), NO_ENV).unwrap();

        // project beats global
        assert_eq!(config.limits.max_concurrent_iterations, 4);
        // global fills what project leaves out
        assert_eq!(config.limits.max_total_iterations, 20);
        // explicit beats project
        assert_eq!(config.runner.aggregation, "consensus");
        // untouched keys keep defaults
        assert_eq!(config.runner.strategy, "parallel");
    }

    #[test]
    fn test_plain_name_preferred_over_dotfile() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("fanout.toml"), "[runner]\nstrategy = \"sequential\"\n")
            .unwrap();
        fs::write(dir.path().join(".fanout.toml"), "[runner]\nstrategy = \"parallel\"\n")
            .unwrap();

        let config = ConfigLoader::load_from(None, dir.path(), None, NO_ENV).unwrap();
        assert_eq!(config.runner.strategy, "sequential");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = ConfigLoader::load_from(None, dir.path(), Some(&missing), NO_ENV).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("fanout.toml"), "[limits]\nmax_concurrent_iterations = \"many\"\n")
            .unwrap();
        assert!(ConfigLoader::load_from(None, dir.path(), None, NO_ENV).is_err());
    }
}
