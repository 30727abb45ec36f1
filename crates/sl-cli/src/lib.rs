use std::io::{self, Write};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use sl_ai::Advisor;
use sl_core::{expiry_badge, filter_items, stock_stats, FormSession, Inventory};
use sl_fs::{resolve_store_path, set_config_path, FsStore};
use sl_utils::short_id;

#[derive(Parser)]
#[command(name = "shelflife", version, about = "ShelfLife inventory CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize the item store.
    Init {
        /// Optional directory to initialize the store at.
        #[arg(long)]
        path: Option<String>,
    },
    /// Add a new item.
    Add {
        #[arg(long)]
        barcode: String,
        /// Product name.
        #[arg(long)]
        name: String,
        /// Expiration date (YYYY-MM-DD).
        #[arg(long)]
        expires: String,
        /// Category; asked of the AI backend when omitted.
        #[arg(long)]
        category: Option<String>,
        /// Units on hand; unparsable input coerces to 0.
        #[arg(long, default_value = "1")]
        quantity: String,
        /// Storage location.
        #[arg(long)]
        location: String,
    },
    /// List items with expiration badges.
    List,
    /// Show a single item by id.
    Show { id: String },
    /// Edit fields of an existing item.
    Edit {
        id: String,
        #[arg(long)]
        barcode: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        expires: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        quantity: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    /// Remove an item permanently.
    Remove {
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Search items by term.
    Search { term: String },
    /// Show derived inventory stats.
    Stats,
    /// Ask the AI backend for inventory insights.
    Insights,
    /// Ask the AI backend for a category suggestion.
    Categorize { name: String },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let command = match cli.command {
        Some(c) => c,
        None => return sl_tui::run(),
    };

    init_tracing();

    if let Command::Init { path } = &command {
        let path = path
            .clone()
            .map(std::path::PathBuf::from)
            .unwrap_or(FsStore::default_path()?);
        let store = FsStore::new(path.clone());
        store.init().context("failed to initialize store")?;
        set_config_path(&path)?;
        println!("Store initialized at {}", path.display());
        return Ok(());
    }

    let store = FsStore::new(resolve_store_path()?);
    let mut inventory = Inventory::open(store).context("failed to load item store")?;

    match command {
        Command::Add {
            barcode,
            name,
            expires,
            category,
            quantity,
            location,
        } => add_item(&mut inventory, barcode, name, expires, category, quantity, location),
        Command::List => list_items(&inventory),
        Command::Show { id } => show_item(&inventory, &id),
        Command::Edit {
            id,
            barcode,
            name,
            expires,
            category,
            quantity,
            location,
        } => edit_item(
            &mut inventory,
            &id,
            barcode,
            name,
            expires,
            category,
            quantity,
            location,
        ),
        Command::Remove { id, yes } => remove_item(&mut inventory, &id, yes),
        Command::Search { term } => search_items(&inventory, &term),
        Command::Stats => print_stats(&inventory),
        Command::Insights => print_insights(&inventory),
        Command::Categorize { name } => print_category(&name),
        Command::Init { .. } => unreachable!("handled above"),
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

fn block_on<F: std::future::Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to initialize runtime")?;
    Ok(runtime.block_on(future))
}

#[allow(clippy::too_many_arguments)]
fn add_item(
    inventory: &mut Inventory<FsStore>,
    barcode: String,
    name: String,
    expires: String,
    category: Option<String>,
    quantity: String,
    location: String,
) -> Result<()> {
    let category = match category {
        Some(category) => category,
        // Degrades to the default label when the backend is unreachable.
        None => block_on(Advisor::from_env().suggest_category(&name))?,
    };

    let mut session = FormSession::create();
    session.draft.barcode = barcode;
    session.draft.product_name = name;
    session.draft.expiration_date = expires;
    session.draft.category = category;
    session.draft.quantity = quantity;
    session.draft.location = location;

    let item = session.submit(inventory, Utc::now()).context("invalid item")?;
    println!("Added {} ({})", item.product_name, short_id(item.id));
    Ok(())
}

fn list_items(inventory: &Inventory<FsStore>) -> Result<()> {
    let now = Utc::now();
    for item in inventory.items() {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            item.id,
            item.product_name,
            item.category,
            item.quantity,
            item.expiration_date,
            expiry_badge(item.expiration_date, now).label()
        );
    }
    Ok(())
}

fn show_item(inventory: &Inventory<FsStore>, id: &str) -> Result<()> {
    let id = Uuid::parse_str(id).context("invalid id")?;
    let Some(item) = inventory.get(id) else {
        return Err(anyhow!("item not found"));
    };
    println!("Id:         {}", item.id);
    println!("Barcode:    {}", item.barcode);
    println!("Product:    {}", item.product_name);
    println!("Category:   {}", item.category);
    println!("Quantity:   {}", item.quantity);
    println!("Expires:    {}", item.expiration_date);
    println!("Location:   {}", item.location);
    println!("Created at: {}", item.created_at);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn edit_item(
    inventory: &mut Inventory<FsStore>,
    id: &str,
    barcode: Option<String>,
    name: Option<String>,
    expires: Option<String>,
    category: Option<String>,
    quantity: Option<String>,
    location: Option<String>,
) -> Result<()> {
    let id = Uuid::parse_str(id).context("invalid id")?;
    let item = inventory
        .get(id)
        .ok_or_else(|| anyhow!("item not found"))?
        .clone();

    let mut session = FormSession::edit(&item);
    if let Some(barcode) = barcode {
        session.draft.barcode = barcode;
    }
    if let Some(name) = name {
        session.draft.product_name = name;
    }
    if let Some(expires) = expires {
        session.draft.expiration_date = expires;
    }
    if let Some(category) = category {
        session.draft.category = category;
    }
    if let Some(quantity) = quantity {
        session.draft.quantity = quantity;
    }
    if let Some(location) = location {
        session.draft.location = location;
    }

    let updated = session.submit(inventory, Utc::now()).context("invalid item")?;
    println!("Updated {} ({})", updated.product_name, short_id(updated.id));
    Ok(())
}

fn remove_item(inventory: &mut Inventory<FsStore>, id: &str, yes: bool) -> Result<()> {
    let id = Uuid::parse_str(id).context("invalid id")?;
    let item = inventory
        .get(id)
        .ok_or_else(|| anyhow!("item not found"))?
        .clone();

    // Deletes are irreversible; require an explicit yes.
    if !yes && !confirm(&format!("Remove {}?", item.product_name))? {
        println!("Cancelled");
        return Ok(());
    }

    inventory.remove(id).context("failed to remove item")?;
    println!("Removed {} ({})", item.product_name, short_id(item.id));
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush().context("failed to flush prompt")?;
    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn search_items(inventory: &Inventory<FsStore>, term: &str) -> Result<()> {
    let now = Utc::now();
    for item in filter_items(inventory.items(), term) {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            item.id,
            item.product_name,
            item.category,
            item.quantity,
            item.expiration_date,
            expiry_badge(item.expiration_date, now).label()
        );
    }
    Ok(())
}

fn print_stats(inventory: &Inventory<FsStore>) -> Result<()> {
    let stats = stock_stats(inventory.items(), Utc::now());
    println!("Total items:\t{}", stats.total);
    println!("Low stock:\t{}", stats.low_stock);
    println!("Expiring soon:\t{}", stats.expiring_soon);
    Ok(())
}

fn print_insights(inventory: &Inventory<FsStore>) -> Result<()> {
    if inventory.items().is_empty() {
        println!("No items to analyze.");
        return Ok(());
    }
    let text = block_on(Advisor::from_env().inventory_insights(inventory.items()))?;
    println!("{text}");
    Ok(())
}

fn print_category(name: &str) -> Result<()> {
    let category = block_on(Advisor::from_env().suggest_category(name))?;
    println!("{category}");
    Ok(())
}
