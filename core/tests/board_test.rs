//! Card faces resolve to a cached pictogram or fall back to the emoji

use async_trait::async_trait;
use pecs_core::board::{self, CardFace};
use pecs_core::pictogram::{PictogramConfig, PictogramProvider};
use pecs_core::{Lexicon, PecsError, PictogramRecord, PictogramSource, Result};
use std::sync::Arc;

/// Knows only "apple"; everything else is offline
struct AppleOnly;

#[async_trait]
impl PictogramSource for AppleOnly {
    async fn search(&self, _lang: &str, term: &str) -> Result<Vec<PictogramRecord>> {
        match term {
            "apple" => Ok(vec![PictogramRecord::new(2462, &["apple"])]),
            _ => Err(PecsError::NetworkError("offline".into())),
        }
    }

    async fn fetch_image(&self, _id: u64, _resolution: u32) -> Result<Vec<u8>> {
        Ok(b"\x89PNG".to_vec())
    }
}

#[tokio::test]
async fn test_food_cards_resolve_or_fall_back() {
    let dir = tempfile::tempdir().unwrap();
    let provider = PictogramProvider::with_parts(
        PictogramConfig {
            cache_dir: dir.path().to_path_buf(),
            ..PictogramConfig::default()
        },
        Arc::new(AppleOnly),
        Lexicon::bundled(),
    );

    let food = board::category("food").unwrap();
    let apple = &food.cards[0];
    let banana = &food.cards[1];

    match CardFace::resolve(apple, &provider, "en", 96).await {
        CardFace::Pictogram(path) => assert!(path.ends_with("2462_300.png")),
        other => panic!("expected a pictogram, got {:?}", other),
    }
    assert_eq!(
        CardFace::resolve(banana, &provider, "en", 96).await,
        CardFace::Glyph("🍌".to_string())
    );
}
