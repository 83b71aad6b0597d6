use crate::cli::args::TagArgs;
use crate::exit_codes;
use sitectl_core::auth::{compute_tag, Secret};

pub fn run(args: TagArgs) -> anyhow::Result<i32> {
    let secret = Secret::new(args.secret);
    println!("{}", compute_tag(args.algorithm, &secret, args.counter));
    Ok(exit_codes::SUCCESS)
}
