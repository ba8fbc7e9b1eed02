#![forbid(unsafe_code)]

use lazy_static::lazy_static;
use log::{info, error};
use poem::listener::{Listener, RustlsCertificate, RustlsConfig};
use poem::{listener::TcpListener, Server};

// Server Utilities
use crate::routes::version::RespVersion;
use crate::utils::config::{app_config_file, init_log, init_runtime_context, read_parms,
                           LogTarget, RuntimeCtx, DEMO_ARGS, DEMO_DIRS};
use crate::utils::demo_utils::timestamp_str;
use crate::utils::errors::Errors;

// Modules
mod routes;
mod utils;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const SERVER_NAME : &str = "CicdDemoServer"; // for poem logging
const KEY_FILE    : &str = "/key.pem";  // relative to certs dir
const CERT_FILE   : &str = "/cert.pem"; // relative to certs dir

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Lazily initialize the parameters variable so that is has a 'static lifetime.
// We exit if we can't read our parameters.
lazy_static! {
    static ref RUNTIME_CTX: RuntimeCtx = init_runtime_context();
}

// ---------------------------------------------------------------------------
// main:
// ---------------------------------------------------------------------------
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    // --------------- Initialize Server --------------
    println!("Starting cicd_demo_server!");

    // Directory creation happens as a side effect of first access.
    if DEMO_ARGS.create_dirs_only {
        println!("Data directories are ready under {}.", DEMO_DIRS.root_dir);
        return Ok(());
    }

    if let Err(e) = demo_init() {
        eprintln!("{}", e);
        return Err(std::io::Error::other(e.to_string()));
    }

    // --------------- Main Loop Set Up ---------------
    let config = &RUNTIME_CTX.parms.config;
    let app = routes::make_app(&config.title, &config.base_url());
    let addr = config.bind_addr();
    info!("{} listening on {} (tls={}) at {}.", SERVER_NAME, addr, config.tls_enabled, timestamp_str());

    // ------------------ Main Loop -------------------
    if config.tls_enabled {
        let tls = match load_tls_config(&RUNTIME_CTX.dirs.certs_dir) {
            Ok(t) => t,
            Err(e) => {
                error!("{}: {}", Errors::TlsCertificate(RUNTIME_CTX.dirs.certs_dir.clone()), e);
                return Err(std::io::Error::other(e.to_string()));
            }
        };
        Server::new(TcpListener::bind(addr).rustls(tls))
            .name(SERVER_NAME)
            .run(app)
            .await
    } else {
        Server::new(TcpListener::bind(addr))
            .name(SERVER_NAME)
            .run(app)
            .await
    }
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// demo_init:
// ---------------------------------------------------------------------------
/** Initialize logging and the runtime context before the main loop starts. */
fn demo_init() -> anyhow::Result<()> {
    match init_log()? {
        LogTarget::File(f) => info!("Log4rs initialized using: {}", f),
        LogTarget::Console => info!("Log4rs initialized to console, no log4rs.yml found."),
    }

    // Report a bad configuration file here, before RUNTIME_CTX would panic on it.
    read_parms(&app_config_file())?;

    // Force the reading of input parameters and initialization of runtime context.
    info!("{}", Errors::InputParms(format!("{:#?}", *RUNTIME_CTX)));
    info!("Logs directory: {}", RUNTIME_CTX.dirs.logs_dir);
    if RUNTIME_CTX.parms.config_file.is_empty() {
        info!("No configuration file found, running with defaults.");
    }

    info!("{}", RespVersion::from_build().banner());
    Ok(())
}

// ---------------------------------------------------------------------------
// load_tls_config:
// ---------------------------------------------------------------------------
/** Read the server's private key and certificate chain from the certs directory. */
fn load_tls_config(certs_dir: &str) -> Result<RustlsConfig, Errors> {
    let key = std::fs::read(certs_dir.to_string() + KEY_FILE)?;
    let cert = std::fs::read(certs_dir.to_string() + CERT_FILE)?;
    Ok(RustlsConfig::new().fallback(RustlsCertificate::new().key(key).cert(cert)))
}
