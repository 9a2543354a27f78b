use crate::{
    Args,
    build::{Builder, base_path_from_config},
    config::WorkshopConfig,
    publish::{BranchOutcome, PublishOptions, publish},
};

pub fn run(args: &Args) -> Result<(), anyhow::Error> {
    let config_path = WorkshopConfig::resolve_path(args.config_file.as_deref())?;
    let config = WorkshopConfig::load(&config_path)?;

    // Relative paths in the config resolve against its directory
    let base_path = base_path_from_config(&config_path);

    let builder = Builder::new(config, base_path);
    let result = builder.build()?;

    println!(
        "Published {} items to {} ({} notebooks, {} pages)",
        result.items.len(),
        result.output_dir.display(),
        result.notebooks(),
        result.pages()
    );

    let options = PublishOptions {
        commit: args.commit,
        keep_temp: args.keep_temp,
    };
    let report = publish(builder.context(), options)?;

    if !report.lfs_tracked.is_empty() {
        println!("Tracked {} new files with Git LFS", report.lfs_tracked.len());
    }
    let branch = &builder.context().config.notebooks_branch;
    match report.branch {
        BranchOutcome::Skipped => println!("Skipped {branch} branch (not a git repository)"),
        BranchOutcome::Pushed => println!("Pushed {branch} branch"),
        BranchOutcome::Prepared => println!(
            "Prepared {branch} branch from {} (dry run, use --commit to push)",
            report.staging_dir.display()
        ),
    }

    Ok(())
}
