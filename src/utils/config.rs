#![forbid(unsafe_code)]

use anyhow::{Result, anyhow};
use log::{info, error, LevelFilter};
use serde::Deserialize;
use std::{env, fs, path::Path};
use fs_mistrust::Mistrust;
use std::os::unix::fs::PermissionsExt;
use lazy_static::lazy_static;
use structopt::StructOpt;

use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::utils::{demo_utils, errors::Errors};

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Directory and file locations. Unless otherwise noted, all files and directories
// are relative to the root directory.
const ENV_ROOT_DIR         : &str = "CICD_DEMO_ROOT_DIR";
const DEFAULT_ROOT_DIR     : &str = "~/.cicd_demo";
const CONFIG_DIR           : &str = "/config";
const LOGS_DIR             : &str = "/logs";
const CERTS_DIR            : &str = "/certs";
const LOG4RS_CONFIG_FILE   : &str = "/log4rs.yml";     // relative to config dir
const APP_CONFIG_FILE      : &str = "/cicd_demo.toml"; // relative to config dir

// Networking.
const DEFAULT_HTTP_ADDR    : &str = "http://localhost";
const DEFAULT_HTTP_PORT    : u16  = 8080;

// Used when no log4rs.yml is installed.
const DEFAULT_LOG_PATTERN  : &str = "{d(%Y-%m-%dT%H:%M:%S%.3f%Z)} {h({l:<5})} {t} - {m}{n}";

// Required permissions on every data directory.
const DIR_MODE             : u32 = 0o700;

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Assign the command line arguments BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref DEMO_ARGS: DemoArgs = init_demo_args();
}

// Calculate the data directories BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref DEMO_DIRS: DemoDirs = init_demo_dirs();
}

// ***************************************************************************
//                             Directory Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// DemoDirs:
// ---------------------------------------------------------------------------
#[derive(Debug)]
pub struct DemoDirs {
    pub root_dir: String,
    pub config_dir: String,
    pub logs_dir: String,
    pub certs_dir: String,
}

// ***************************************************************************
//                               Config Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// DemoArgs:
// ---------------------------------------------------------------------------
#[derive(Debug, StructOpt)]
#[structopt(name = "cicd_demo_server", about = "Command line arguments for the CI/CD Demo Server.")]
pub struct DemoArgs {
    /// Specify the server's root data directory.
    ///
    /// This directory contains the config, logs and certs subdirectories.
    #[structopt(short, long)]
    pub root_dir: Option<String>,

    /// Create the data directories and then exit.
    ///
    /// The data directories will be rooted at a root directory calculated
    /// using the following priority order:
    ///
    ///   1. If set, the value of the CICD_DEMO_ROOT_DIR environment,
    ///
    ///   2. Otherwise, if set, the value of the --root-dir command line argument,
    ///
    ///   3. Otherwise, ~/.cicd_demo
    ///
    #[structopt(short, long)]
    pub create_dirs_only: bool,
}

// ---------------------------------------------------------------------------
// Parms:
// ---------------------------------------------------------------------------
#[derive(Debug)]
pub struct Parms {
    pub config_file: String,
    pub config: Config,
}

// ---------------------------------------------------------------------------
// RuntimeCtx:
// ---------------------------------------------------------------------------
#[derive(Debug)]
pub struct RuntimeCtx {
    pub parms: Parms,
    pub dirs: &'static DemoDirs,
}

// ---------------------------------------------------------------------------
// Config:
// ---------------------------------------------------------------------------
/// Contents of cicd_demo.toml.  Every field is optional.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub title: String,
    /// Advertised base address, used in the OpenAPI servers list.
    pub http_addr: String,
    pub http_port: u16,
    /// Serve https using certs/key.pem and certs/cert.pem.
    pub tls_enabled: bool,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }

    /// The externally visible url of the server.
    pub fn base_url(&self) -> String {
        format!("{}:{}", self.http_addr, self.http_port)
    }

    /// The socket address the listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.http_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "CI/CD Demo Server".to_string(),
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            tls_enabled: false,
        }
    }
}

// ***************************************************************************
//                            Directory Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_demo_args:
// ---------------------------------------------------------------------------
/** Get the command line arguments. */
fn init_demo_args() -> DemoArgs {
    let args = DemoArgs::from_args();
    println!("{:?}", args);
    args
}

// ---------------------------------------------------------------------------
// init_demo_dirs:
// ---------------------------------------------------------------------------
/** Calculate and create the external data directories.  The server cannot
 * run without them, so any failure aborts.
 */
fn init_demo_dirs() -> DemoDirs {
    let mistrust = match get_mistrust() {
        Ok(m) => m,
        Err(e) => panic!("{}", e),
    };
    match create_demo_dirs(&get_root_dir(), &mistrust) {
        Ok(dirs) => dirs,
        Err(e) => panic!("{}", e),
    }
}

// ---------------------------------------------------------------------------
// create_demo_dirs:
// ---------------------------------------------------------------------------
/** Check or create the root directory and each of its data subdirectories. */
pub fn create_demo_dirs(root_dir: &str, mistrust: &Mistrust) -> Result<DemoDirs> {
    let root_dir = root_dir.to_string();
    check_demo_dir(&root_dir, "root directory", mistrust)?;

    let config_dir = root_dir.clone() + CONFIG_DIR;
    check_demo_dir(&config_dir, "config directory", mistrust)?;

    let logs_dir = root_dir.clone() + LOGS_DIR;
    check_demo_dir(&logs_dir, "logs directory", mistrust)?;

    let certs_dir = root_dir.clone() + CERTS_DIR;
    check_demo_dir(&certs_dir, "certs directory", mistrust)?;

    Ok(DemoDirs { root_dir, config_dir, logs_dir, certs_dir })
}

// ---------------------------------------------------------------------------
// check_demo_dir:
// ---------------------------------------------------------------------------
/** Check that the path is absolute and, if it exists, that is has the proper
 * permissions assigned.  If it doesn't exist, create it.  The mistrust package
 * creates directories with 0o700 permissions.
 */
fn check_demo_dir(dir: &str, msgname: &str, mistrust: &Mistrust) -> Result<()> {
    let invalid = |reason: String| {
        anyhow!(Errors::InvalidDataDir(msgname.to_string(), dir.to_string(), reason))
    };

    let path = Path::new(dir);
    if !path.is_absolute() {
        return Err(invalid("path must be absolute".to_string()));
    }

    if path.exists() {
        if !path.is_dir() {
            return Err(invalid("path must be a directory".to_string()));
        }

        let meta = path.metadata().map_err(|e| invalid(e.to_string()))?;
        let perm = meta.permissions().mode();
        if perm & 0o777 != DIR_MODE {
            return Err(invalid(format!("path must have {:#o} permissions, found {:#o}",
                                       DIR_MODE, perm & 0o777)));
        }
    } else {
        mistrust.make_directory(path).map_err(|e| invalid(e.to_string()))?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// get_mistrust:
// ---------------------------------------------------------------------------
/** Configure a new mistrust object for initial directory processing. */
fn get_mistrust() -> Result<Mistrust> {
    Mistrust::builder()
        .ignore_prefix(demo_utils::get_absolute_path("~"))
        .trust_group(0)
        .build()
        .map_err(|e| anyhow!("Mistrust configuration error: {}", e))
}

// ---------------------------------------------------------------------------
// get_root_dir:
// ---------------------------------------------------------------------------
fn get_root_dir() -> String {
    // Order of precedence:
    //  1. Environment variable
    //  2. Command line --root-dir argument
    //  3. Default location
    //
    let root_dir = env::var(ENV_ROOT_DIR).unwrap_or_else(
        |_| DEMO_ARGS.root_dir.clone().unwrap_or_else(|| DEFAULT_ROOT_DIR.to_string()));

    demo_utils::get_absolute_path(&root_dir)
}

// ***************************************************************************
//                               Log Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// LogTarget:
// ---------------------------------------------------------------------------
/// Where log4rs took its configuration from.
#[derive(Debug, PartialEq)]
pub enum LogTarget {
    File(String),
    Console,
}

// ---------------------------------------------------------------------------
// init_log:
// ---------------------------------------------------------------------------
pub fn init_log() -> Result<LogTarget> {
    init_log_from(&DEMO_DIRS.config_dir)
}

// ---------------------------------------------------------------------------
// init_log_from:
// ---------------------------------------------------------------------------
/** Initialize log4rs from the config directory's log4rs.yml if there is one,
 * otherwise log to the console at info level.
 */
pub fn init_log_from(config_dir: &str) -> Result<LogTarget> {
    let logconfig = config_dir.to_string() + LOG4RS_CONFIG_FILE;
    if Path::new(&logconfig).exists() {
        if let Err(e) = log4rs::init_file(&logconfig, Default::default()) {
            return Err(anyhow!("{}\n   {}", Errors::Log4rsInitialization(logconfig), e));
        }
        Ok(LogTarget::File(logconfig))
    } else {
        init_console_log()
            .map_err(|e| anyhow!("{}\n   {}", Errors::Log4rsInitialization("console".to_string()), e))?;
        Ok(LogTarget::Console)
    }
}

// ---------------------------------------------------------------------------
// init_console_log:
// ---------------------------------------------------------------------------
fn init_console_log() -> Result<()> {
    log4rs::init_config(console_log_config()?)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// console_log_config:
// ---------------------------------------------------------------------------
fn console_log_config() -> Result<LogConfig> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(DEFAULT_LOG_PATTERN)))
        .build();
    let config = LogConfig::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info))?;
    Ok(config)
}

// ***************************************************************************
//                             Parms Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// read_parms:
// ---------------------------------------------------------------------------
/** Read the application parameters from the configuration file.  A missing
 * file means all defaults; a file that does not parse is an error.
 */
pub fn read_parms(config_file: &str) -> Result<Parms> {
    let config_file_abs = demo_utils::get_absolute_path(config_file);
    info!("{}", Errors::ReadingConfigFile(config_file_abs.clone()));
    let contents = match fs::read_to_string(&config_file_abs) {
        Ok(c) => c,
        Err(_) => {
            info!("Unable to read configuration at {}. Using default values.", config_file_abs);
            return Ok(Parms { config_file: Default::default(), config: Config::new() });
        }
    };

    let config : Config = match toml::from_str(&contents) {
        Ok(c)  => c,
        Err(e) => {
            let msg = format!("{}\n   {}", Errors::TOMLParseError(config_file_abs), e);
            error!("{}", msg);
            return Result::Err(anyhow!(msg));
        }
    };

    Ok(Parms { config_file: config_file_abs, config })
}

// ***************************************************************************
//                             Config Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// app_config_file:
// ---------------------------------------------------------------------------
pub fn app_config_file() -> String {
    DEMO_DIRS.config_dir.clone() + APP_CONFIG_FILE
}

// ---------------------------------------------------------------------------
// init_runtime_context:
// ---------------------------------------------------------------------------
/** Callers should run read_parms on app_config_file() first so that a bad
 * configuration file is reported as an error rather than a panic here.
 */
pub fn init_runtime_context() -> RuntimeCtx {
    let parms = match read_parms(&app_config_file()) {
        Ok(p) => p,
        Err(e) => panic!("FAILED to read configuration file: {}", e),
    };
    RuntimeCtx {parms, dirs: &DEMO_DIRS}
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::Permissions;

    // Trust the temporary directory and everything above it.
    fn tmp_mistrust(dir: &Path) -> Mistrust {
        Mistrust::builder().ignore_prefix(dir).build().unwrap()
    }

    #[test]
    fn default_config() {
        let config = Config::new();
        assert_eq!(config.title, "CI/CD Demo Server");
        assert_eq!(config.http_port, 8080);
        assert!(!config.tls_enabled);
        assert_eq!(config.base_url(), "http://localhost:8080");
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str("http_port = 9090\n").unwrap();
        assert_eq!(config.http_port, 9090);
        assert_eq!(config.http_addr, "http://localhost");
        assert!(!config.tls_enabled);
    }

    #[test]
    fn read_parms_missing_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("cicd_demo.toml");
        let parms = read_parms(file.to_str().unwrap()).unwrap();
        assert_eq!(parms.config_file, "");
        assert_eq!(parms.config, Config::default());
    }

    #[test]
    fn read_parms_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("cicd_demo.toml");
        fs::write(&file, "title = \"staging\"\nhttp_addr = \"https://demo.example.org\"\n\
                          http_port = 8443\ntls_enabled = true\n").unwrap();

        let parms = read_parms(file.to_str().unwrap()).unwrap();
        assert_eq!(parms.config_file, file.to_str().unwrap());
        assert_eq!(parms.config.title, "staging");
        assert_eq!(parms.config.base_url(), "https://demo.example.org:8443");
        assert!(parms.config.tls_enabled);
    }

    #[test]
    fn read_parms_rejects_bad_toml() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("cicd_demo.toml");
        fs::write(&file, "http_port = \"not a number\"\n").unwrap();
        let err = read_parms(file.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Unable to parse TOML file"));
        assert!(err.to_string().contains(file.to_str().unwrap()));
    }

    #[test]
    fn console_log_config_is_info_to_stdout() {
        let config = console_log_config().unwrap();
        assert_eq!(config.root().level(), LevelFilter::Info);
        assert_eq!(config.appenders().len(), 1);
        assert_eq!(config.appenders()[0].name(), "stdout");
    }

    // The only test that installs the global logger.
    #[test]
    fn missing_log4rs_file_falls_back_to_console() {
        let tmp = tempfile::tempdir().unwrap();
        let target = init_log_from(tmp.path().to_str().unwrap()).unwrap();
        assert_eq!(target, LogTarget::Console);
    }

    #[test]
    fn malformed_log4rs_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("log4rs.yml"), "appenders: [unclosed\n").unwrap();
        let err = init_log_from(tmp.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Unable to initialize Log4rs using"));
    }

    #[test]
    fn create_dirs_under_private_root() {
        let tmp = tempfile::tempdir().unwrap();
        fs::set_permissions(tmp.path(), Permissions::from_mode(0o700)).unwrap();
        let root = tmp.path().to_str().unwrap();

        let dirs = create_demo_dirs(root, &tmp_mistrust(tmp.path())).unwrap();
        assert_eq!(dirs.root_dir, root);
        assert!(Path::new(&dirs.config_dir).is_dir());
        assert!(Path::new(&dirs.logs_dir).is_dir());
        assert!(Path::new(&dirs.certs_dir).is_dir());
    }

    #[test]
    fn reject_group_readable_root() {
        let tmp = tempfile::tempdir().unwrap();
        fs::set_permissions(tmp.path(), Permissions::from_mode(0o755)).unwrap();

        let err = create_demo_dirs(tmp.path().to_str().unwrap(), &tmp_mistrust(tmp.path()))
            .unwrap_err();
        assert!(err.to_string().contains("0o700"));
    }

    #[test]
    fn reject_file_as_root() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("not_a_dir");
        fs::write(&file, "x").unwrap();

        let err = create_demo_dirs(file.to_str().unwrap(), &tmp_mistrust(tmp.path()))
            .unwrap_err();
        assert!(err.to_string().contains("must be a directory"));
    }

    #[test]
    fn reject_relative_root() {
        let tmp = tempfile::tempdir().unwrap();
        let err = create_demo_dirs("relative/root", &tmp_mistrust(tmp.path())).unwrap_err();
        assert!(err.to_string().contains("must be absolute"));
    }
}
