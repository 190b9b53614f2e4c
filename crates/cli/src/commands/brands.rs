//! `brandforge brands`: list the brand configurations on disk.

use super::load_config;
use std::path::Path;

pub fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let brands = brandforge_config::list_available_brands(&config.brands_dir)?;

    if brands.is_empty() {
        println!("No brands found in {}", config.brands_dir.display());
        return Ok(());
    }
    println!("Brands in {}:", config.brands_dir.display());
    for name in brands {
        match brandforge_config::load_brand(&config.brands_dir, &name) {
            Ok(brand) => println!(
                "  {:<20} {} (v{}, {:?} evaluation)",
                name, brand.name, brand.version, brand.models.content_evaluation.pattern
            ),
            Err(e) => println!("  {name:<20} INVALID: {e}"),
        }
    }
    Ok(())
}
