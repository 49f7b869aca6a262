use clap::Parser;

use rlc_core::{LiWidth, debug};

mod decoder;
use decoder::{PduDecoder, parse_hex};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "RLC AM PDU Decoder",
    long_about = "Decodes a hex encoded RLC AM PDU, either a data PDU (segment) or a status PDU"
)]
struct Args {
    /// Raw PDU bytes
    #[arg(help = "PDU as hex string, whitespace and ':' separators are ignored")]
    hex: String,

    #[arg(
        short = 'l',
        long = "li-width",
        default_value = "normal",
        help = "Length indicator width of data PDUs: [ normal | extended ]"
    )]
    li_width: String,
}

fn main() {
    eprintln!("[+] RLC AM PDU Decoding tool");

    let args = Args::parse();
    let _log_guard = debug::setup_logging_default(None);

    let li_width = match args.li_width.to_lowercase().as_str() {
        "normal" | "11" => LiWidth::Normal,
        "extended" | "15" => LiWidth::Extended,
        _ => {
            eprintln!("Error: Unsupported li width '{}'. Use: normal, extended", args.li_width);
            std::process::exit(1);
        }
    };

    let pdu = match parse_hex(&args.hex) {
        Ok(pdu) => pdu,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = PduDecoder::new(li_width).decode(&pdu) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
