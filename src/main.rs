//! Maison Storefront - command-line client for the storefront backend

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use maison_storefront::api::{ApiClient, LoginOutcome, LoginRequest};
use maison_storefront::cache::QueryCache;
use maison_storefront::config::Config;
use maison_storefront::domain::aggregates::{CheckoutForm, OrderPlacement, PaymentCallback};
use maison_storefront::services::{CartMerge, CartMode, CartService, CartUpdate, CatalogService, CheckoutService};
use maison_storefront::store::LocalCartStore;
use maison_storefront::{Cart, CustomerInfo, PaymentMethod, ShippingAddress, VariantKey};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "maison", version, about = "Maison storefront client")]
struct Cli {
    /// Backend base URL
    #[arg(long, env = "STOREFRONT_API_URL")]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List products
    Products {
        /// Only products visible in the storefront
        #[arg(long)]
        live: bool,
    },
    /// Show one product with its reviews
    Product { id: String },
    /// Categories and brands for filtering
    Filters,
    #[command(subcommand)]
    Cart(CartCommand),
    /// Place an order for the current cart
    Checkout(CheckoutArgs),
    /// Confirm a gateway payment from the return URL query string
    VerifyPayment { query: String },
    /// Your orders, or every order with --all (admin)
    Orders {
        #[arg(long)]
        all: bool,
    },
    Order { id: String },
    /// Sign in and print the session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "STOREFRONT_PASSWORD")]
        password: String,
    },
    /// Finish a two-factor login
    #[command(name = "verify-2fa")]
    VerifyTwoFactor {
        #[arg(long)]
        temp_token: String,
        #[arg(long)]
        code: String,
    },
    /// Dashboard statistics (admin)
    Stats,
    Banners,
}

#[derive(Subcommand)]
enum CartCommand {
    Show,
    Add {
        product_id: String,
        #[arg(long, default_value_t = 1)]
        quantity: u32,
        #[command(flatten)]
        variant: VariantArgs,
    },
    /// Set the quantity of a line; 0 removes it
    Set {
        product_id: String,
        quantity: u32,
        #[command(flatten)]
        variant: VariantArgs,
    },
    Remove {
        product_id: String,
        #[command(flatten)]
        variant: VariantArgs,
    },
    /// Move the guest cart into the signed-in account
    Merge,
}

#[derive(Args)]
struct VariantArgs {
    #[arg(long)]
    size: Option<String>,
    #[arg(long)]
    color: Option<String>,
}

impl VariantArgs {
    fn key(&self, product_id: &str) -> VariantKey { VariantKey::new(product_id, self.size.clone(), self.color.clone()) }
}

#[derive(Args)]
struct CheckoutArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    address: String,
    #[arg(long)]
    city: String,
    #[arg(long)]
    postal_code: String,
    #[arg(long)]
    country: String,
    /// Pay online through the payment gateway instead of cash on delivery
    #[arg(long)]
    online: bool,
}

impl From<CheckoutArgs> for CheckoutForm {
    fn from(a: CheckoutArgs) -> Self {
        CheckoutForm {
            shipping: ShippingAddress { address: a.address, city: a.city, postal_code: a.postal_code, country: a.country },
            customer: CustomerInfo { name: a.name, email: a.email, phone: a.phone },
            payment_method: if a.online { PaymentMethod::Online } else { PaymentMethod::CashOnDelivery },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)).init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(url) = cli.api_url { config.api_url = url.trim_end_matches('/').to_string(); }

    let api = ApiClient::new(&config)?;
    let cache = QueryCache::new(config.cache_capacity, config.cache_ttl, config.query_retries);
    let catalog = CatalogService::new(api.clone(), cache);
    tracing::debug!(api = %config.api_url, "storefront client ready");

    match cli.command {
        Command::Products { live } => print(&catalog.products(live).await?),
        Command::Product { id } => {
            let product = catalog.product(&id).await?;
            let reviews = catalog.reviews(&id).await?;
            print(&serde_json::json!({ "product": product, "reviews": reviews }))
        }
        Command::Filters => {
            let filters = catalog.filter_options().await?;
            print(&serde_json::json!({ "categories": filters.categories, "brands": filters.brands }))
        }
        Command::Cart(command) => {
            let cart = cart_service(&config, &api).await?;
            run_cart(&catalog, &cart, command).await
        }
        Command::Checkout(args) => {
            let cart = cart_service(&config, &api).await?;
            let mut checkout = CheckoutService::new(api.clone());
            match checkout.place_order(&cart, &args.into()).await? {
                OrderPlacement::Confirmed(order) => print(&order)?,
                OrderPlacement::Redirect { payment_url, .. } => println!("Complete your payment at {}", payment_url),
            }
            notices(checkout.take_events());
            Ok(())
        }
        Command::VerifyPayment { query } => {
            let cart = cart_service(&config, &api).await?;
            let mut checkout = CheckoutService::new(api.clone());
            let order = checkout.verify_payment(&cart, &PaymentCallback::from_query(&query)?).await?;
            notices(checkout.take_events());
            print(&order)
        }
        Command::Orders { all } => print(&if all { api.all_orders().await? } else { api.my_orders().await? }),
        Command::Order { id } => print(&api.order(&id).await?),
        Command::Login { email, password } => {
            match api.login(&LoginRequest { email, password }).await? {
                LoginOutcome::Authenticated(user) => {
                    eprintln!("Signed in as {}", user.email);
                    println!("{}", api.token().await.context("backend returned no session token")?);
                }
                LoginOutcome::TwoFactorRequired { temp_token } => {
                    eprintln!("Two-factor code required; run `maison verify-2fa --temp-token <token> --code <code>`");
                    println!("{}", temp_token);
                }
            }
            Ok(())
        }
        Command::VerifyTwoFactor { temp_token, code } => {
            let user = api.verify_two_factor(&temp_token, &code).await?;
            eprintln!("Signed in as {}", user.email);
            println!("{}", api.token().await.context("backend returned no session token")?);
            Ok(())
        }
        Command::Stats => {
            let (stats, updates) = catalog.dashboard().await?;
            print(&serde_json::json!({ "stats": stats, "recentUpdates": updates }))
        }
        Command::Banners => print(&catalog.banners().await?),
    }
}

async fn cart_service(config: &Config, api: &ApiClient) -> Result<CartService<ApiClient>> {
    let local = LocalCartStore::connect(&config.cart_db_url).await.with_context(|| format!("opening cart store {}", config.cart_db_url))?;
    let mode = if api.is_authenticated().await { CartMode::Member } else { CartMode::Guest };
    Ok(CartService::new(api.clone(), local, mode, &config.currency))
}

async fn run_cart(catalog: &CatalogService, cart: &CartService<ApiClient>, command: CartCommand) -> Result<()> {
    match command {
        CartCommand::Show => show_cart(&cart.load().await?),
        CartCommand::Add { product_id, quantity, variant } => {
            let product = catalog.product(&product_id).await?;
            report(cart.add_product(&product, variant.size.as_deref(), variant.color.as_deref(), quantity).await?)
        }
        CartCommand::Set { product_id, quantity, variant } => report(cart.update_quantity(&variant.key(&product_id), quantity).await?),
        CartCommand::Remove { product_id, variant } => report(cart.remove(&variant.key(&product_id)).await?),
        CartCommand::Merge => {
            anyhow::ensure!(cart.mode().await == CartMode::Member, "sign in first (set STOREFRONT_TOKEN)");
            let CartMerge { cart, events } = cart.merge_guest_cart().await?;
            notices(events);
            show_cart(&cart)
        }
    }
}

fn report(update: CartUpdate) -> Result<()> {
    notices(update.events);
    show_cart(&update.cart)
}

fn notices(events: Vec<maison_storefront::DomainEvent>) {
    for event in events {
        if event.is_warning() { eprintln!("warning: {}", event) } else { eprintln!("{}", event) }
    }
}

fn show_cart(cart: &Cart) -> Result<()> {
    for line in cart.lines() {
        println!("{:>3} x {:<40} {:>12}  [{}]", line.quantity, line.name, line.line_total(cart.currency()).to_string(), line.key);
    }
    println!("{} item(s), subtotal {}", cart.item_count(), cart.subtotal());
    Ok(())
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
