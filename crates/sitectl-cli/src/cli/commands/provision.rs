use crate::cli::args::ProvisionArgs;
use crate::exit_codes;
use anyhow::Context;
use chrono::Utc;
use sitectl_core::datastore::SqliteDatastore;
use sitectl_core::EndpointConfig;

/// Fresh 256-bit secret, hex encoded.
fn generate_secret() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

pub fn run(args: ProvisionArgs) -> anyhow::Result<i32> {
    if args.config.exists() && !args.force {
        eprintln!(
            "{} already exists; pass --force to replace it",
            args.config.display()
        );
        return Ok(exit_codes::CONFIG_ERROR);
    }

    let secret = generate_secret();
    let config = EndpointConfig {
        secret: Some(secret.clone()),
        issued_at: Some(Utc::now()),
        window_secs: args.window_secs,
        tag_algorithm: args.algorithm,
        site_root: args.site_root,
        database: args.database,
        table_prefix: args.table_prefix,
        ..Default::default()
    };
    config.validate()?;
    config
        .save(&args.config)
        .with_context(|| format!("cannot write {}", args.config.display()))?;

    if args.install_schema {
        // Paths in the config are relative to the file just written.
        let saved = EndpointConfig {
            source: Some(args.config.clone()),
            ..config.clone()
        };
        let datastore = SqliteDatastore::open(&saved.database_path())?;
        sitectl_core::app::install_schema(&datastore, &saved.table_prefix)?;
        tracing::info!(database = %saved.database_path().display(), "schema installed");
    }

    tracing::info!(
        config = %args.config.display(),
        window_secs = config.window_secs,
        algorithm = config.tag_algorithm.as_str(),
        "credential provisioned"
    );
    println!("{secret}");
    Ok(exit_codes::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_secrets_are_distinct_hex() {
        let a = generate_secret();
        let b = generate_secret();
        assert_eq!(a.len(), 64);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
