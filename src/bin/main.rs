use clap::{App, Arg, ArgMatches, SubCommand};
use review_store::image_file::ImageUpload;
use review_store::record_store::{
    DefaultRecordStore, ListMode, PersistenceMode, RecordStore, SqliteStore,
};
use review_store::remote_store::HttpRemote;
use review_store::review_record::ReviewRecord;
use std::path::Path;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let field_arg = |name: &'static str, help: &'static str| {
        Arg::with_name(name)
            .long(name)
            .help(help)
            .required(false)
            .takes_value(true)
    };

    let save_cmd = SubCommand::with_name("save")
        .about("creates or updates a review in the authoritative store")
        .arg(
            Arg::with_name("type")
                .long("type")
                .short("t")
                .help("Product type of the review (e.g. Fleur, Hash).")
                .required(true)
                .takes_value(true),
        )
        .arg(field_arg("name", "Product name, the primary identity field."))
        .arg(field_arg("cultivars", "Cultivar list, used as name fallback."))
        .arg(field_arg("breeder", "Breeder of the product."))
        .arg(field_arg("farm", "Producing farm."))
        .arg(field_arg("id", "Id of an existing review to update."))
        .arg(field_arg("image", "Path of an image file to attach."))
        .arg(
            Arg::with_name("private")
                .long("private")
                .help("Marks the review private (remote visibility).")
                .takes_value(false),
        )
        .arg(
            Arg::with_name("draft")
                .long("draft")
                .help("Saves as an autosave draft instead of a final review.")
                .takes_value(false),
        );

    let list_cmd = SubCommand::with_name("list")
        .about("lists reviews of the authoritative store")
        .arg(
            Arg::with_name("public")
                .long("public")
                .help("Lists the public gallery instead of your own reviews.")
                .takes_value(false),
        );

    let id_arg = Arg::with_name("ID")
        .required(true)
        .index(1)
        .help("Id of the review");
    let show_cmd = SubCommand::with_name("show")
        .about("prints a single review as JSON")
        .arg(id_arg.clone());
    let delete_cmd = SubCommand::with_name("delete")
        .about("deletes a review (best-effort remote, always local)")
        .arg(id_arg.clone());

    let privacy_cmd = SubCommand::with_name("privacy")
        .about("toggles the public/private flag of a review on the remote service")
        .arg(id_arg)
        .arg(
            Arg::with_name("private")
                .long("private")
                .help("Makes the review private.")
                .takes_value(false),
        )
        .arg(
            Arg::with_name("public")
                .long("public")
                .help("Makes the review public.")
                .takes_value(false),
        );

    let dedupe_cmd = SubCommand::with_name("dedupe")
        .about("collapses duplicate reviews (destructive, requires --apply)")
        .arg(
            Arg::with_name("apply")
                .long("apply")
                .help("Actually removes duplicates instead of only reporting them.")
                .takes_value(false),
        );

    let db_path_arg = Arg::with_name("DB_PATH")
        .required(true)
        .index(1)
        .help("Path of the local review database file");
    let cli = App::new("ReviewStore")
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Local-first store for product reviews with optional remote synchronization")
        .arg(db_path_arg)
        .arg(
            Arg::with_name("remote")
                .long("remote")
                .help("Base URL of the remote review service.")
                .required(false)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("token")
                .long("token")
                .help("Auth token for the remote review service.")
                .required(false)
                .takes_value(true),
        )
        .subcommand(save_cmd)
        .subcommand(list_cmd)
        .subcommand(show_cmd)
        .subcommand(delete_cmd)
        .subcommand(privacy_cmd)
        .subcommand(dedupe_cmd)
        .get_matches();

    let db_path = cli.value_of("DB_PATH").unwrap();
    let remote = HttpRemote::new(
        cli.value_of("remote").unwrap_or(""),
        cli.value_of("token").map(|t| t.to_string()),
    );

    let mode = PersistenceMode::detect(&remote).await;
    if mode.remote_is_authoritative() {
        println!("Remote service detected, it is authoritative for this session.");
    }

    let local = match SqliteStore::open(db_path, mode) {
        Ok(local) => local,
        Err(err) => {
            eprintln!("Could not open the review database at '{}': {}", db_path, err);
            std::process::exit(1);
        }
    };
    let mut store = RecordStore::new(local, remote, mode);

    if let Some(save_cli) = cli.subcommand_matches("save") {
        save_review(&mut store, &save_cli).await;
    } else if let Some(list_cli) = cli.subcommand_matches("list") {
        list_reviews(&store, &list_cli).await;
    } else if let Some(show_cli) = cli.subcommand_matches("show") {
        show_review(&store, &show_cli).await;
    } else if let Some(delete_cli) = cli.subcommand_matches("delete") {
        delete_review(&mut store, &delete_cli).await;
    } else if let Some(privacy_cli) = cli.subcommand_matches("privacy") {
        toggle_privacy(&store, &privacy_cli).await;
    } else if let Some(dedupe_cli) = cli.subcommand_matches("dedupe") {
        dedupe_reviews(&mut store, &dedupe_cli).await;
    } else {
        println!("Please specify the command you want to perform on the review store.");
        println!("See --help for more information.");
    }
}

async fn save_review(store: &mut DefaultRecordStore, cmd_cli: &ArgMatches<'_>) {
    let mut record = ReviewRecord::default();
    record.product_type = cmd_cli.value_of("type").unwrap().to_string();
    record.product_name = cmd_cli.value_of("name").map(|v| v.to_string());
    record.cultivars = cmd_cli.value_of("cultivars").map(|v| v.to_string());
    record.breeder = cmd_cli.value_of("breeder").map(|v| v.to_string());
    record.farm = cmd_cli.value_of("farm").map(|v| v.to_string());
    record.date = chrono::Utc::now().to_rfc3339();
    record.is_private = cmd_cli.is_present("private");
    record.is_draft = cmd_cli.is_present("draft");

    if let Some(id) = cmd_cli.value_of("id") {
        match id.parse::<i64>() {
            Ok(id) => record.id = Some(id),
            Err(_) => {
                eprintln!("'{}' is not a valid review id!", id);
                return;
            }
        }
    }

    let upload = match cmd_cli.value_of("image") {
        Some(image_path) => match ImageUpload::from_path(Path::new(image_path)) {
            Ok(upload) => {
                record.image = Some(upload.to_data_url());
                Some(upload)
            }
            Err(err) => {
                eprintln!("Could not read image file '{}': {}", image_path, err);
                return;
            }
        },
        None => None,
    };

    match store.save_with_image(record, upload.as_ref()).await {
        Ok(outcome) => {
            if outcome.ok {
                match outcome.id {
                    Some(id) => println!("Review saved (id: {})!", id),
                    None => println!("Review saved!"),
                }
            } else if let Some(remote_error) = outcome.remote_error {
                eprintln!("The remote service did not accept the save: {}", remote_error);
            } else {
                eprintln!(
                    "Local storage failed, keeping the review in memory for this session only."
                );
            }
        }
        Err(err) => eprintln!("{}", err),
    }
}

async fn list_reviews(store: &DefaultRecordStore, cmd_cli: &ArgMatches<'_>) {
    let mode = if cmd_cli.is_present("public") {
        ListMode::Public
    } else {
        ListMode::Mine
    };

    match store.list(mode).await {
        Ok(mut reviews) => {
            if reviews.is_empty() {
                println!("No reviews stored.");
                return;
            }
            // Newest first, the way library views present them.
            reviews.sort_by(|a, b| b.date.cmp(&a.date));
            for review in reviews {
                let id = review
                    .id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let name = review
                    .product_name
                    .clone()
                    .or_else(|| review.cultivars.clone())
                    .unwrap_or_else(|| review.product_type.clone());
                let draft_marker = if review.is_draft { " (draft)" } else { "" };
                println!(
                    "[{}] {} - {} | {}{}",
                    id, name, review.product_type, review.date, draft_marker
                );
            }
        }
        Err(err) => eprintln!("{}", err),
    }
}

async fn show_review(store: &DefaultRecordStore, cmd_cli: &ArgMatches<'_>) {
    let id = match parse_id(cmd_cli) {
        Some(id) => id,
        None => return,
    };

    match store.get_by_id(id).await {
        Ok(Some(review)) => match serde_json::to_string_pretty(&review) {
            Ok(json) => println!("{}", json),
            Err(err) => eprintln!("Could not render the review: {}", err),
        },
        Ok(None) => println!("No review with id {}.", id),
        Err(err) => eprintln!("{}", err),
    }
}

async fn delete_review(store: &mut DefaultRecordStore, cmd_cli: &ArgMatches<'_>) {
    let id = match parse_id(cmd_cli) {
        Some(id) => id,
        None => return,
    };

    match store.delete(id).await {
        Ok(true) => println!("Review {} deleted.", id),
        Ok(false) => println!("No review with id {}.", id),
        Err(err) => eprintln!("{}", err),
    }
}

async fn toggle_privacy(store: &DefaultRecordStore, cmd_cli: &ArgMatches<'_>) {
    let id = match parse_id(cmd_cli) {
        Some(id) => id,
        None => return,
    };
    if cmd_cli.is_present("private") == cmd_cli.is_present("public") {
        eprintln!("Specify exactly one of --private or --public.");
        return;
    }
    let is_private = cmd_cli.is_present("private");

    match store.set_visibility(id, is_private).await {
        Ok(true) => println!(
            "Review {} is now {}.",
            id,
            if is_private { "private" } else { "public" }
        ),
        Ok(false) => println!("No remote service active, visibility unchanged."),
        Err(err) => eprintln!("{}", err),
    }
}

async fn dedupe_reviews(store: &mut DefaultRecordStore, cmd_cli: &ArgMatches<'_>) {
    if !cmd_cli.is_present("apply") {
        match store.plan_deduplication().await {
            Ok(plan) => {
                println!(
                    "Would remove {} duplicate review(s). Re-run with --apply to do it.",
                    plan.deletions.len()
                );
            }
            Err(err) => eprintln!("{}", err),
        }
        return;
    }

    match store.run_deduplication(true).await {
        Ok(report) => println!("Removed {} duplicate review(s).", report.removed),
        Err(err) => eprintln!("{}", err),
    }
}

fn parse_id(cmd_cli: &ArgMatches<'_>) -> Option<i64> {
    let raw = cmd_cli.value_of("ID").unwrap();
    match raw.parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            eprintln!("'{}' is not a valid review id!", raw);
            None
        }
    }
}
