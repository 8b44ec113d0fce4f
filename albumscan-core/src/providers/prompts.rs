//! Instruction text sent to the backends
//!
//! Only the JSON shapes requested here are load-bearing; they must stay in
//! sync with the parsers in [`super::response`].

use crate::types::{IdentificationResult, SearchRefinement};

pub const IDENTIFY_INSTRUCTIONS: &str = r#"You identify music albums from photographs of their covers.
Reply with a single JSON object and nothing else, in one of these forms:
{"status":"identified","artist":"...","title":"...","year":"YYYY","genres":["..."],"label":"...","confidence":"high|medium|low"}
{"status":"needs_refinement","strategy":"metadata|visual","query":"...","reason":"...","observation":{...}}
{"status":"unresolved","message":"..."}
Use "needs_refinement" only when the cover cannot be resolved directly and a search hint would help."#;

pub const REFINE_INSTRUCTIONS: &str = r#"You identify music albums from photographs of their covers.
A previous attempt could not resolve this cover and produced the search hint below.
Use the hint together with the image. Reply with a single JSON object and nothing else:
{"status":"identified","artist":"...","title":"...","year":"YYYY","genres":["..."],"label":"...","confidence":"high|medium|low"}
{"status":"unresolved","message":"..."}"#;

pub const REVIEW_INSTRUCTIONS: &str = r#"You are a music critic. Review the album described by the user.
Reply with a single JSON object and nothing else:
{"summary":"...","bullets":["3 to 5 short points"],"rating":0.0-10.0,"recommendation":"Essential|Recommended|Skip|Avoid","key_tracks":["..."]}"#;

pub const IDENTIFY_REQUEST: &str = "Identify the album on this cover.";

pub fn refinement_request(refinement: &SearchRefinement) -> String {
    format!(
        "Search hint ({:?}): {}\nReason: {}\nEarlier observation: {}",
        refinement.strategy, refinement.query, refinement.reason, refinement.observation
    )
}

pub fn review_request(album: &IdentificationResult) -> String {
    let mut request = format!("Artist: {}\nTitle: {}", album.artist, album.title);
    if let Some(year) = &album.year {
        request.push_str(&format!("\nYear: {}", year));
    }
    if !album.genres.is_empty() {
        request.push_str(&format!("\nGenres: {}", album.genres.join(", ")));
    }
    if let Some(label) = &album.label {
        request.push_str(&format!("\nLabel: {}", label));
    }
    request
}
