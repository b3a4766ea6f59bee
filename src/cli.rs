use clap::Parser;

#[derive(Parser)]
#[command(name = "chat", about = "Multi-user TCP chat")]
pub struct Cli {
    /// Run as the chat server (default is client)
    #[arg(short = 's', long = "server")]
    pub server: bool,

    /// Host to connect to in client mode
    #[arg(short = 'u', long = "host", default_value = "localhost")]
    pub host: String,

    /// TCP port to listen on (server) or connect to (client)
    pub port: u16,
}
