use ad_consent::ConsentInformation;

pub fn device_info(info: &ConsentInformation) -> anyhow::Result<()> {
    println!("Hashed device id: {}", info.hashed_device_id());
    println!(
        "Test device:      {}",
        if info.is_test_device() { "yes" } else { "no" }
    );
    println!("Debug geography:  {:?}", info.debug_geography());
    Ok(())
}
