//! Process bootstrap: load the configuration, start every configured web
//! and RTMP server on its own thread, then hand the terminal over to a
//! small operator shell.

mod config;
mod http;
mod rtmp_service;

use config::Config;
use log::info;
use std::io::{self, BufRead, Write};
use std::thread;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Minnow Media Server");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_or_create(&config_path);

    let web_settings = config.web_servers();
    let rtmp_settings = config.rtmp_servers();

    let web_ids: Vec<String> = web_settings.iter().map(|s| s.id.clone()).collect();
    let rtmp_ids: Vec<String> = rtmp_settings.iter().map(|s| s.id.clone()).collect();

    // Server threads run for the life of the process; stopping a server
    // only means no longer accepting, so exit simply ends the process and
    // lets in-flight connection threads die with it.
    for settings in web_settings {
        let server = http::WebServer::new(settings);
        thread::spawn(move || server.run());
    }

    for settings in rtmp_settings {
        let server = rtmp_service::RtmpServer::new(settings);
        thread::spawn(move || server.run());
    }

    run_shell(&config, &web_ids, &rtmp_ids);

    info!("Shutting down");
}

fn run_shell(config: &Config, web_ids: &[String], rtmp_ids: &[String]) {
    let stdin = io::stdin();

    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => (),
        }

        let mut words = line.split_whitespace();
        let command = match words.next() {
            Some(command) => command,
            None => continue,
        };

        match command {
            "help" => {
                println!("Commands:");
                println!(" help - Show all commands");
                println!(" show - Show current config");
                println!(" list - List servers");
                println!(" exit - Exit all servers");
            }

            "show" => {
                println!("{}", config.text);
            }

            "list" => {
                println!("Servers:");
                println!(" [Web]");
                for id in web_ids {
                    println!("  Id: {}", id);
                }
                println!(" [Rtmp]");
                for id in rtmp_ids {
                    println!("  Id: {}", id);
                }
            }

            "exit" => break,

            unknown => {
                println!("Unknown command: {}", unknown);
            }
        }
    }
}
