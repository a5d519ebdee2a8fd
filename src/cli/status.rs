use comfy_table::{Cell, Table};

use ad_consent::{ConsentInformation, ConsentStatus};

pub fn status(info: &ConsentInformation, format: &str) -> anyhow::Result<()> {
    let data = info.load_consent_data()?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);

    let publisher_ids = data.publisher_ids.iter().cloned().collect::<Vec<_>>();
    let rows = [
        ("Consent status", data.consent_status.to_string()),
        (
            "Set by",
            data.consent_source
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".into()),
        ),
        (
            "Regulated region",
            data.is_request_in_eea_or_unknown.to_string(),
        ),
        (
            "Under age of consent",
            data.under_age_of_consent.to_string(),
        ),
        ("Ad providers", data.ad_providers.len().to_string()),
        (
            "Consented providers",
            data.consented_ad_providers.len().to_string(),
        ),
        (
            "Non-personalized publisher",
            data.has_non_personalized_publisher_id.to_string(),
        ),
        (
            "Publisher ids",
            if publisher_ids.is_empty() {
                "-".into()
            } else {
                publisher_ids.join(", ")
            },
        ),
        (
            "SDK",
            format!("{} {}", data.sdk_platform, data.sdk_version),
        ),
    ];

    for (field, value) in rows {
        table.add_row(vec![Cell::new(field), Cell::new(value)]);
    }

    println!("{table}");
    Ok(())
}

pub fn set_status(info: &ConsentInformation, status: ConsentStatus) -> anyhow::Result<()> {
    info.set_consent_status(status)?;
    println!("Consent status set to {status}.");
    Ok(())
}

pub fn tag_under_age(info: &ConsentInformation, value: bool) -> anyhow::Result<()> {
    info.set_tag_for_under_age_of_consent(value)?;
    if value {
        println!("Tagged as under the age of consent; the consent form will not be shown.");
    } else {
        println!("Under-age-of-consent tag removed.");
    }
    Ok(())
}

pub fn reset(info: &ConsentInformation) -> anyhow::Result<()> {
    info.reset()?;
    println!("Consent information cleared.");
    Ok(())
}
