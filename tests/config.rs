use pricefetch::config::{ConfigLoader, OutputConfig};
use pricefetch::error::Error;
use pricefetch::item::Variant;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn child_config_extends_parent() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "base.yaml",
        "queue:\n  base_delay_ms: 500\n  delay_increment_ms: 100\noutput:\n  type: csv\n  path: out.csv\n",
    );
    let child = write(
        &dir,
        "config.toml",
        "extends = \"base.yaml\"\n\n[queue]\ndelay_increment_ms = 250\n\n[cache]\nversion = 3\n",
    );

    let config = ConfigLoader::load_file_only(&child).unwrap();

    assert_eq!(config.queue.base_delay_ms, 500);
    assert_eq!(config.queue.delay_increment_ms, 250);
    assert_eq!(config.cache.version, 3);
    assert_eq!(config.cache.namespace, "pricefetch");
    assert!(matches!(config.output, Some(OutputConfig::Csv { ref path }) if path == "out.csv"));
    assert!(config.extends.is_none());
}

#[test]
fn defaults_fill_an_empty_file() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "empty.json", "{}");

    let config = ConfigLoader::load_file_only(&path).unwrap();
    let settings = config.queue.settings();

    assert_eq!(settings.base_delay.as_millis(), 1000);
    assert_eq!(settings.delay_increment.as_millis(), 1000);
    assert_eq!(settings.max_rate_limit_retries, None);
    assert_eq!(config.cache.expiration_ms, 86_400_000);
    assert!(config.output.is_none());
}

#[test]
fn environment_overrides_file_values() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "config.json", r#"{"queue": {"base_delay_ms": 2000}}"#);

    unsafe {
        std::env::set_var("PRICEFETCH__QUEUE__BASE_DELAY_MS", "250");
    }
    let config = ConfigLoader::load(&path);
    unsafe {
        std::env::remove_var("PRICEFETCH__QUEUE__BASE_DELAY_MS");
    }

    assert_eq!(config.unwrap().queue.base_delay_ms, 250);
}

#[test]
fn circular_inheritance_is_rejected() {
    let dir = TempDir::new().unwrap();
    write(&dir, "a.json", r#"{"extends": "b.json"}"#);
    let b = write(&dir, "b.json", r#"{"extends": "a.json"}"#);

    let err = ConfigLoader::load_file_only(&b).unwrap_err();
    assert!(matches!(err, Error::Config(msg) if msg.contains("Circular")));
}

#[test]
fn zero_increment_fails_validation() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "config.json", r#"{"queue": {"delay_increment_ms": 0}}"#);

    let err = ConfigLoader::load_file_only(&path).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn unknown_extension_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "config.ini", "queue=1");

    let err = ConfigLoader::load_file_only(&path).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn items_file_becomes_groups() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "items.yaml",
        r#"
cart_total: "12,50 €"
groups:
  - name: seller-1
    paid_total: "7,00 €"
    items:
      - label: Lightning Bolt
        link: https://shop.example/Products/Bolt
        foil: true
        quantity: 2
        seller_price: "1,20 €"
      - label: No link here
  - name: seller-2
"#,
    );

    let items = ConfigLoader::load_items(&path).unwrap();
    assert_eq!(items.cart_total(), Some(12.5));

    let groups = items.to_groups("language=1");
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].paid_total, Some(7.0));
    assert!(groups[1].items.is_empty());
    assert!(groups[1].paid_total.is_none());

    let bolt = &groups[0].items[0];
    assert_eq!(
        bolt.key(),
        Some("https://shop.example/Products/Bolt?language=1&isFoil=Y")
    );
    assert_eq!(bolt.variant, Variant::Foil);
    assert_eq!(bolt.quantity, Some(2));
    assert_eq!(bolt.seller_price_text.as_deref(), Some("1,20 €"));

    assert!(groups[0].items[1].key().is_none());
}

#[test]
fn items_file_needs_a_group() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "items.json", r#"{"groups": []}"#);

    let err = ConfigLoader::load_items(&path).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}
