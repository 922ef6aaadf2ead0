//! face-control - CLI control utility for the face-ng daemon
//!
//! Talks to the daemon over the session bus.

use clap::{Parser, Subcommand};
use zbus::blocking::Connection;

/// CLI control utility for the face-ng daemon
#[derive(Parser)]
#[command(name = "face-control")]
#[command(version)]
#[command(about = "Control utility for the face-ng daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service health
    Ping,

    /// Get daemon version
    Version,

    /// Show interaction state and current expression
    Status,

    /// Poke the face (angry overlay and "ouch")
    Poke,

    /// Switch to another idle expression
    Next,

    /// Inject text as if it had been heard
    Hear {
        /// Text to inject, e.g. "unip vá para a sala"
        text: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let conn = Connection::session()?;

    let dest = "org.face.Service";
    let path = "/org/face/Service";
    let iface = "org.face.Service";

    match cli.command {
        Commands::Ping => {
            let result: String = conn
                .call_method(Some(dest), path, Some(iface), "Ping", &())?
                .body()
                .deserialize()?;
            println!("{}", result);
        }

        Commands::Version => {
            let result: String = conn
                .call_method(Some(dest), path, Some(iface), "GetVersion", &())?
                .body()
                .deserialize()?;
            println!("face-ng {}", result);
        }

        Commands::Status => {
            let (state, expression, talking): (String, String, bool) = conn
                .call_method(Some(dest), path, Some(iface), "GetStatus", &())?
                .body()
                .deserialize()?;

            println!("face-ng Status");
            println!("──────────────");
            println!("State:       {}", state);
            println!("Expression:  {}", expression);
            println!("Talking:     {}", if talking { "Yes" } else { "No" });
        }

        Commands::Poke => {
            let _: () = conn
                .call_method(Some(dest), path, Some(iface), "Poke", &())?
                .body()
                .deserialize()?;
            println!("Ouch sent");
        }

        Commands::Next => {
            let _: () = conn
                .call_method(Some(dest), path, Some(iface), "NextExpression", &())?
                .body()
                .deserialize()?;
            println!("Expression changed");
        }

        Commands::Hear { text } => {
            let _: () = conn
                .call_method(Some(dest), path, Some(iface), "Hear", &text)?
                .body()
                .deserialize()?;
            println!("Injected: {}", text);
        }
    }

    Ok(())
}
