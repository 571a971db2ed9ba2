// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use clap::{Parser, Subcommand};
use serialport::{DataBits, Parity, StopBits};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use serlink::protocol::{DEFAULT_MAX_ATTEMPTS, MAX_PAYLOAD_SIZE};
use serlink::{receiver, sender};
use serlink::{LinkConfig, LinkSession, LinkStats, RealSerialPort, Role};

#[derive(Parser)]
#[command(name = "serlink")]
#[command(about = "Reliable file transfer over a serial line with framed stop-and-wait ARQ", long_about = None)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Serial port to use (e.g., /dev/ttyUSB0 or COM1)
    #[arg(short, long)]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value = "38400")]
    baud: u32,

    /// Data bits (5, 6, 7, or 8)
    #[arg(long, default_value = "8", value_name="BITS")]
    data_bits: u8,

    /// Parity (none, odd, or even)
    #[arg(long, default_value = "none")]
    parity: String,

    /// Stop bits (1 or 2)
    #[arg(long, default_value = "1", value_name="BITS")]
    stop_bits: u8,

    /// Seconds to wait for an acknowledgment before retransmitting
    #[arg(long, default_value = "3", value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Transmissions of a frame before giving up, the first one included
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS, value_name = "N")]
    retries: u32,

    /// Largest payload carried by one frame (at most 65538)
    #[arg(long, default_value_t = MAX_PAYLOAD_SIZE, value_name = "BYTES")]
    max_payload: usize,

    /// Enable debug output
    #[arg(long)]
    debug: bool,

    /// Enable byte-level trace output
    #[arg(long)]
    trace: bool,

    /// Print link statistics after the transfer
    #[arg(long)]
    stats: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a file, opening the link as initiator
    Send {
        /// File to send
        file: PathBuf,
    },
    /// Receive a file, answering the link as responder
    Receive {
        /// Directory to save the received file
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
}

fn parse_data_bits(bits: u8) -> Result<DataBits, String> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        _ => Err(format!("Invalid data bits: {}. Must be 5, 6, 7, or 8", bits)),
    }
}

fn parse_parity(parity: &str) -> Result<Parity, String> {
    match parity.to_lowercase().as_str() {
        "none" => Ok(Parity::None),
        "odd" => Ok(Parity::Odd),
        "even" => Ok(Parity::Even),
        _ => Err(format!("Invalid parity: {}. Must be 'none', 'odd', or 'even'", parity)),
    }
}

fn parse_stop_bits(bits: u8) -> Result<StopBits, String> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        _ => Err(format!("Invalid stop bits: {}. Must be 1 or 2", bits)),
    }
}

fn exit_with(message: impl std::fmt::Display) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.trace {
        Level::TRACE
    } else if cli.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let data_bits = parse_data_bits(cli.data_bits).unwrap_or_else(|e| exit_with(format!("Error: {}", e)));
    let parity = parse_parity(&cli.parity).unwrap_or_else(|e| exit_with(format!("Error: {}", e)));
    let stop_bits = parse_stop_bits(cli.stop_bits).unwrap_or_else(|e| exit_with(format!("Error: {}", e)));

    let role = match cli.command {
        Commands::Send { ref file } => {
            if !file.is_file() {
                exit_with(format!("Error: File not found: {}", file.display()));
            }
            Role::Initiator
        }
        Commands::Receive { ref output_dir } => {
            if !output_dir.is_dir() {
                exit_with(format!("Error: Output directory not found: {}", output_dir.display()));
            }
            Role::Responder
        }
    };

    let config = LinkConfig::new(role)
        .retry(cli.retries, Duration::from_secs(cli.timeout))
        .max_payload(cli.max_payload);

    println!("Opening serial port: {}", cli.port);
    println!("Settings: {} baud, {:?}, {:?}, {:?}", cli.baud, data_bits, parity, stop_bits);

    let mut serial_port = RealSerialPort::open(&cli.port, cli.baud, data_bits, parity, stop_bits)
        .unwrap_or_else(|e| exit_with(format!("Failed to open serial port: {}", e)));

    println!("Opening link as {:?}...", role);
    let session = LinkSession::open(&mut serial_port, config)
        .unwrap_or_else(|e| exit_with(format!("Connection failed: {}", e)));
    println!("Link open as {:?}", session.role());

    let stats = match cli.command {
        Commands::Send { file } => {
            println!("\nSending file: {}", file.display());
            let stats = sender::send_file(session, file)
                .unwrap_or_else(|e| exit_with(format!("Send failed: {}", e)));
            println!("\nFile sent successfully!");
            stats
        }
        Commands::Receive { output_dir } => {
            println!("\nReceiving file to: {}", output_dir.display());
            let stats = receiver::receive_file(session, output_dir)
                .unwrap_or_else(|e| exit_with(format!("Receive failed: {}", e)));
            println!("\nFile received successfully!");
            stats
        }
    };

    if cli.stats {
        print_stats(&stats);
    }
}

fn print_stats(stats: &LinkStats) {
    println!("\nLink statistics:");
    println!("  Frames sent:        {}", stats.frames_sent);
    println!("  Frames received:    {}", stats.frames_received);
    println!("  Retransmissions:    {}", stats.retransmissions);
    println!("  Timeouts:           {}", stats.timeouts);
    println!("  Rejects sent:       {}", stats.rejects_sent);
    println!("  Rejects received:   {}", stats.rejects_received);
    println!("  Duplicates:         {}", stats.duplicates);
    println!("  Echoed frames:      {}", stats.ignored_frames);
    println!("  Header errors:      {}", stats.header_errors);
    println!("  Framing errors:     {}", stats.framing_errors);
}
