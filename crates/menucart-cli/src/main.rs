//! menucart - command-line front end for the storefront cart and menu cache.
//!
//! The cart and the cached menu live under the user's data directory, so
//! every invocation sees the state the previous one left behind.

mod app;

use std::io;

use anyhow::{bail, Result};
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

const USAGE: &str = "\
Usage:
  menucart menu [section]                     Show the menu (cached when fresh)
  menucart refresh [section]                  Refetch the menu now
  menucart watch [section]                    Refresh periodically until Ctrl+C
  menucart cart                               Show cart lines and totals
  menucart cart add <name> [price] [image]    Add one unit of an item
  menucart cart add-product <id> [section]    Add one unit of a menu product
  menucart cart inc|dec <line-id> [n]         Change a line's quantity
  menucart cart remove <line-id>              Remove a line
  menucart cart clear                         Empty the cart
  menucart set-url <url>                      Save the catalog backend URL
  menucart set-key <api-key>                  Store the catalog API key
  menucart clear-key                          Forget the catalog API key

Set RUST_LOG=debug for diagnostics.";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    info!("menucart starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        [] | ["help"] | ["--help"] | ["-h"] => {
            println!("{}", USAGE);
            Ok(())
        }
        ["set-key", key] => App::set_api_key(key),
        ["set-url", url] => App::set_catalog_url(url),
        ["clear-key"] => App::clear_api_key(),
        ["menu", rest @ ..] => App::new()?.show_menu(section_arg(rest)?).await,
        ["refresh", rest @ ..] => App::new()?.refresh(section_arg(rest)?).await,
        ["watch", rest @ ..] => App::new()?.watch(section_arg(rest)?).await,
        ["cart", rest @ ..] => run_cart(App::new()?, rest).await,
        _ => {
            eprintln!("{}", USAGE);
            bail!("Unknown command: {}", args.join(" "))
        }
    }
}

async fn run_cart(app: App, args: &[&str]) -> Result<()> {
    match args {
        [] | ["show"] => app.show_cart(),
        ["add", name, rest @ ..] => {
            let (price, image) = match rest {
                [] => (None, None),
                [price] => (Some(parse_price(price)?), None),
                [price, image] => (Some(parse_price(price)?), Some(*image)),
                _ => bail!("Usage: menucart cart add <name> [price] [image]"),
            };
            app.cart_add(name, price, image)
        }
        ["add-product", id, rest @ ..] => app.cart_add_product(id, section_arg(rest)?).await,
        ["inc", id, rest @ ..] => app.cart_adjust(id, i64::from(step_arg(rest)?)),
        ["dec", id, rest @ ..] => app.cart_adjust(id, -i64::from(step_arg(rest)?)),
        ["remove", id] => app.cart_remove(id),
        ["clear"] => app.cart_clear(),
        _ => bail!("Unknown cart command: {}\n\n{}", args.join(" "), USAGE),
    }
}

fn section_arg<'a>(rest: &[&'a str]) -> Result<Option<&'a str>> {
    match rest {
        [] => Ok(None),
        [section] => Ok(Some(*section)),
        _ => bail!("Expected at most one section name"),
    }
}

/// Step count for inc/dec. The direction comes from the command, so only
/// non-negative counts are accepted.
fn step_arg(rest: &[&str]) -> Result<u32> {
    match rest {
        [] => Ok(1),
        [n] => n
            .parse::<u32>()
            .map_err(|_| anyhow::anyhow!("Invalid step: {}", n)),
        _ => bail!("Expected at most one step count"),
    }
}

fn parse_price(raw: &str) -> Result<Decimal> {
    raw.trim()
        .parse::<Decimal>()
        .map_err(|e| anyhow::anyhow!("Invalid price '{}': {}", raw, e))
}
