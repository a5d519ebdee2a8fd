use ad_consent::ConsentInformation;

pub async fn update(
    info: &ConsentInformation,
    publisher_ids: &[String],
    url: Option<&str>,
) -> anyhow::Result<()> {
    println!(
        "Requesting consent information for {}...",
        publisher_ids.join(", ")
    );

    let status = match url {
        Some(url) => {
            info.request_consent_info_update_from(publisher_ids, url)
                .await?
        }
        None => info.request_consent_info_update(publisher_ids).await?,
    };

    let in_region = info.is_request_in_eea_or_unknown()?;
    let providers = info.ad_providers()?;

    println!("Consent status:   {status}");
    println!(
        "Regulated region: {}",
        if in_region { "yes (or unknown)" } else { "no" }
    );
    println!("Ad providers:     {}", providers.len());
    if in_region && status == ad_consent::ConsentStatus::Unknown {
        println!("\nConsent is required. Run `ad-consent form --privacy-url <url>` to collect it.");
    }
    Ok(())
}
