//! Console-driven broadcast server.
//!
//! Relays every inbound message to the other peers and broadcasts lines typed
//! on stdin to everyone. Type `exit` to stop.
//!
//! Run with: `cargo run --example console -- :9876`

use linecast::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let address = std::env::args().nth(1).unwrap_or_else(|| ":9876".to_string());
    let server = Server::new();

    server.on_event(|event| match event {
        ServerEvent::Started => println!("Server Started"),
        ServerEvent::Stopped => println!("Server Stopped"),
        ServerEvent::ConnectionAccepted => println!("Connection Accepted"),
        ServerEvent::ConnectionClosed => println!("Connection Closed"),
    });
    server.on_error(|err| println!("Server Error: {}", err));

    let relay = server.clone();
    server.on_message(move |id, msg| {
        let line = format!("Message from {}: {}\r\n", id, msg);
        print!("{}", line);
        relay.send_message_to_all_except(&line, id);
    });

    let runner = server.clone();
    let accept_task = tokio::spawn(async move { runner.start("tcp", &address).await });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    let msg = line.trim_matches(['\n', '\r', '\t']);
                    if msg == "exit" {
                        break;
                    }
                    server.send_message_to_all(format!("Message from Server: {}\r\n", msg));
                }
                None => break,
            },

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    server.stop();
    if let Err(e) = accept_task.await? {
        tracing::error!("Server exited with error: {}", e);
    }

    println!("Bye, have a beautiful time!");
    Ok(())
}
