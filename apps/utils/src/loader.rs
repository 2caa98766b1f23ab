//! 数值参数文件的加载.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use pet_berry::config::PvcConfig;
use pet_berry::{PvcError, PvcResult};

/// 指向参数文件的环境变量.
pub const CONFIG_ENV: &str = "PETPVC_CONFIG";

/// 获取参数文件路径.
///
/// 若环境变量 `$PETPVC_CONFIG` 非空, 则返回其值; 否则返回 `None`.
pub fn config_path_from_env() -> Option<PathBuf> {
    env::var_os(CONFIG_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// 解析 toml 格式的参数. 缺省字段取默认值, 解析后检查参数范围.
pub fn parse_config(text: &str) -> PvcResult<PvcConfig> {
    let config: PvcConfig = toml::from_str(text).map_err(|e| PvcError::Config(e.to_string()))?;
    config.validate().map_err(PvcError::Config)?;
    Ok(config)
}

/// 从 toml 文件读取参数.
pub fn config_from_file<P: AsRef<Path>>(path: P) -> PvcResult<PvcConfig> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|e| PvcError::Config(format!("cannot read `{}`: {e}", path.display())))?;
    parse_config(&text).map_err(|e| match e {
        PvcError::Config(msg) => PvcError::Config(format!("`{}`: {msg}", path.display())),
        other => other,
    })
}

/// 从 `$PETPVC_CONFIG` 指向的文件读取参数. 未设置该变量时使用默认参数.
pub fn config_from_env() -> PvcResult<PvcConfig> {
    match config_path_from_env() {
        Some(path) => {
            info!("Loading parameters from {}", path.display());
            config_from_file(path)
        }
        None => Ok(PvcConfig::default()),
    }
}

/// 默认参数的 toml 文本.
pub fn default_config_toml() -> PvcResult<String> {
    let mut s =
        toml::to_string(&PvcConfig::default()).map_err(|e| PvcError::Config(e.to_string()))?;
    s.push('\n');
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let c = parse_config("max_condition = 500.0\n").unwrap();
        assert_eq!(c.max_condition, 500.0);
        assert_eq!(c.max_kernel_width, PvcConfig::default().max_kernel_width);
    }

    #[test]
    fn test_default_round_trip() {
        let text = default_config_toml().unwrap();
        assert_eq!(parse_config(&text).unwrap(), PvcConfig::default());
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(matches!(
            parse_config("kernel_max_error = 2.0"),
            Err(PvcError::Config(_))
        ));
        assert!(matches!(
            parse_config("max_condition = \"big\""),
            Err(PvcError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let r = config_from_file("/no/such/params.toml");
        match r {
            Err(PvcError::Config(msg)) => assert!(msg.contains("/no/such/params.toml")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
