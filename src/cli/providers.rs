use comfy_table::{Cell, Table};

use ad_consent::ConsentInformation;

pub fn list_providers(info: &ConsentInformation) -> anyhow::Result<()> {
    let providers = info.ad_providers()?;

    if providers.is_empty() {
        println!("No ad providers known. Run `ad-consent update --pub-id <id>` first.");
        return Ok(());
    }

    let consented = info.load_consent_data()?.consented_ad_providers;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Consented", "Privacy Policy"]);

    for p in &providers {
        table.add_row(vec![
            Cell::new(&p.id),
            Cell::new(&p.name),
            Cell::new(if consented.contains(p) { "yes" } else { "no" }),
            Cell::new(&p.privacy_policy_url),
        ]);
    }

    println!("{table}");
    Ok(())
}
