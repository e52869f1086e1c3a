// src/utils/html.rs

/// Clean admin-authored HTML using the ammonia library.
///
/// Safe formatting tags (like <b>, <p>) survive, while <script>, <iframe> and
/// event-handler attributes are stripped, including the content of <script>.
///
/// Answer keys and option texts are compared against learner input verbatim,
/// so they must not go through here.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
