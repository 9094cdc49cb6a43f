use std::sync::Arc;

use chrono::{TimeZone, Utc};
use listing_core::{
    PatternRegistry, PatternSpec, RecordExtractor, RecordValidator, RejectReason, ValidationBounds,
};
use listing_engine::extract_page;
use pretty_assertions::assert_eq;
use scraper::Html;

fn extractor() -> RecordExtractor {
    let registry = PatternRegistry::compile(&PatternSpec::villa_los_jardines()).unwrap();
    RecordExtractor::with_clock(
        Arc::new(registry),
        RecordValidator::new(ValidationBounds::villa_los_jardines()),
        Arc::new(|| Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
    )
}

fn results_page() -> String {
    let mut items = String::new();
    for i in 1..=12u64 {
        let price = if i == 7 {
            "$8.000".to_string()
        } else {
            format!("$ {}.000.000", 80 + i)
        };
        items.push_str(&format!(
            r#"<li class="ui-search-result">
                <h2 class="poly-component__title">Casa en Villa Los Jardines {i}</h2>
                <div class="poly-component__price">
                    <span class="andes-money-amount">
                        <span class="andes-money-amount__currency-symbol">$</span>
                        <span class="andes-money-amount__fraction">{}</span>
                    </span>
                </div>
                <ul>
                    <li class="poly-attributes_list__item">{} dormitorios</li>
                    <li class="poly-attributes_list__item">{} m² útiles</li>
                </ul>
                <span class="poly-component__location">Pasaje {i}, Ñuñoa</span>
                <p>Con jardín</p>
            </li>"#,
            price.trim_start_matches(['$', ' ']),
            2 + i % 3,
            90 + i * 5,
        ));
    }
    format!("<html><body><ol>{items}</ol></body></html>")
}

#[test]
fn parallel_extraction_matches_serial_order_and_content() {
    let html = Html::parse_document(&results_page());
    let extractor = extractor();

    let serial = extract_page(&html, &extractor, 1);
    let parallel = extract_page(&html, &extractor, 4);

    assert_eq!(serial, parallel);
    assert_eq!(serial.container.as_deref(), Some(".ui-search-result"));
    assert_eq!(serial.candidates, 12);
    assert_eq!(serial.records.len(), 11);
    assert_eq!(serial.rejected.len(), 1);
    assert_eq!(serial.rejected[0].index, 6);
    assert_eq!(
        serial.rejected[0].reason,
        RejectReason::PriceOutOfRange {
            price: 8_000,
            currency: listing_core::Currency::Clp
        }
    );

    let first = &serial.records[0];
    assert_eq!(first.title.as_deref(), Some("Casa en Villa Los Jardines 1"));
    assert_eq!(first.price, Some(81_000_000));
    assert_eq!(first.bedrooms, Some(3));
    assert_eq!(first.area_m2, Some(95));
    assert_eq!(first.address.as_deref(), Some("Pasaje 1, Ñuñoa"));
    assert!(first.features.contains("jardín"));
}

#[test]
fn page_without_containers_yields_nothing() {
    let html = Html::parse_document("<html><body><p>Sin resultados</p></body></html>");
    let extraction = extract_page(&html, &extractor(), 4);

    assert_eq!(extraction.container, None);
    assert_eq!(extraction.candidates, 0);
    assert!(extraction.records.is_empty());
}
