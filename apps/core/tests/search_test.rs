use serde_json::{json, Map, Value};
use wikisearch_core::model::Page;
use wikisearch_core::search::{
    assemble, decode_search_response, image_params, image_request_titles, match_images,
    search_params, MAX_IMAGE_TITLES,
};
use wikisearch_core::settings::SearchSettings;

fn pages(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

#[test]
fn assembles_in_search_rank_order() {
    let map = pages(json!({
        "30": {"pageid": 30, "title": "Third", "extract": "c", "index": 3},
        "10": {"pageid": 10, "title": "First", "extract": "a", "index": 1},
        "20": {"pageid": 20, "title": "Second", "extract": "b", "index": 2}
    }));
    let titles: Vec<String> = assemble(&map, true, "en")
        .into_iter()
        .map(|page| page.title)
        .collect();
    assert_eq!(titles, vec!["First", "Second", "Third"]);
}

#[test]
fn excludes_disambiguation_pages_when_configured() {
    let map = pages(json!({
        "1": {"pageid": 1, "title": "Mercury", "extract": "may refer to",
              "pageprops": {"disambiguation": ""}},
        "2": {"pageid": 2, "title": "Mercury (planet)", "extract": "planet"}
    }));
    let kept = assemble(&map, true, "en");
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].id, 2);

    let all = assemble(&map, false, "en");
    assert_eq!(all.len(), 2);
    assert!(all.iter().any(|page| page.is_disambiguation));
}

#[test]
fn skips_malformed_records() {
    let map = pages(json!({
        "1": {"pageid": 1, "title": "No extract"},
        "2": {"title": "No id", "extract": "x"},
        "3": {"pageid": 3, "title": "Fine", "extract": "ok"}
    }));
    let kept = assemble(&map, true, "en");
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].title, "Fine");
    assert_eq!(kept[0].language, "en");
}

#[test]
fn decodes_pages_and_suggestion() {
    let response = decode_search_response(&json!({
        "batchcomplete": "",
        "query": {
            "searchinfo": {"suggestion": "einstein"},
            "pages": {"736": {"pageid": 736, "title": "Albert Einstein", "extract": "physicist..."}}
        }
    }))
    .unwrap();
    assert_eq!(response.suggestion.as_deref(), Some("einstein"));
    assert_eq!(response.pages.map(|pages| pages.len()), Some(1));
}

#[test]
fn api_error_object_without_query_is_empty() {
    let response = decode_search_response(&json!({
        "error": {"code": "badvalue", "info": "Unrecognized value"}
    }))
    .unwrap();
    assert!(response.pages.is_none());
}

#[test]
fn search_params_follow_settings() {
    let settings = SearchSettings {
        max_results: 5,
        max_chars: 120,
        ..SearchSettings::default()
    };
    let params = search_params("Albert Einstein", &settings);
    assert!(params.contains(&("generator", "search".to_string())));
    assert!(params.contains(&("gsrsearch", "Albert Einstein".to_string())));
    assert!(params.contains(&("gsrlimit", "5".to_string())));
    assert!(params.contains(&("exchars", "120".to_string())));
    assert!(params.contains(&("prop", "info|extracts|pageprops|images".to_string())));
}

#[test]
fn image_titles_are_capped() {
    let images: Vec<Value> = (0..80)
        .map(|i| json!({"title": format!("File:Img {i}.png")}))
        .collect();
    let page = Page::from_api(
        &json!({"pageid": 1, "title": "T", "extract": "E", "images": images}),
        "en",
    )
    .unwrap();
    let titles = image_request_titles(&page);
    assert_eq!(titles.len(), MAX_IMAGE_TITLES);

    let params = image_params(&titles[..2], &SearchSettings::default());
    assert!(params.contains(&("titles", "File:Img 0.png|File:Img 1.png".to_string())));
    assert!(params.contains(&("iiurlwidth", "200".to_string())));
    assert!(params.contains(&("iiurlheight", "150".to_string())));
}

#[test]
fn matches_normalized_images_with_page_image_first() {
    let page = Page::from_api(
        &json!({
            "pageid": 736, "title": "Albert Einstein", "extract": "physicist...",
            "pageprops": {"page_image": "einstein_1921.jpg"},
            "images": [{"title": "File:Signature.svg"}, {"title": "File:Nobel.png"}]
        }),
        "en",
    )
    .unwrap();
    let requested = image_request_titles(&page);
    assert_eq!(requested[0], "File:Einstein 1921.jpg");

    let response = json!({"query": {
        "normalized": [{"from": "File:Einstein 1921.jpg", "to": "File:Einstein 1921 portrait.jpg"}],
        "pages": {
            "-1": {"title": "File:Nobel.png", "imagerepository": "local",
                   "imageinfo": [{"url": "n", "thumburl": "nt", "thumbwidth": 80, "thumbheight": 80}]},
            "-2": {"title": "File:Signature.svg", "imagerepository": "shared",
                   "imageinfo": [{"url": "s", "thumburl": "st", "thumbwidth": 80, "thumbheight": 20}]},
            "-3": {"title": "File:Einstein 1921 portrait.jpg", "imagerepository": "shared",
                   "imageinfo": [{"url": "e", "thumburl": "et", "thumbwidth": 120, "thumbheight": 150}]}
        }
    }});

    let images = match_images(&response, &page, &requested).unwrap();
    let titles: Vec<&str> = images.iter().map(|image| image.title.as_str()).collect();
    assert_eq!(titles, vec!["File:Einstein 1921 portrait.jpg", "File:Nobel.png"]);
    assert!(images[0].is_page_image);
    assert!(!images[1].is_page_image);
}
