use axum::{
    Form,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::{Html, Response},
};
use serde::Deserialize;

use super::{escape, layout, parse_id, see_other};
use crate::{
    AppState,
    auth::Identity,
    error::PageError,
    models::{Movie, NewReview, PageQuery, RATING_RANGE, Review},
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WatchlistForm {
    pub movie_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReviewForm {
    pub movie_id: String,
    pub rating: String,
    pub title: String,
    pub content: String,
    /// Checkbox: present (any value) means checked.
    pub contains_spoilers: Option<String>,
}

fn movie_summary(movie: &Movie) -> String {
    let year = movie
        .release_date
        .map(|d| d.format(" (%Y)").to_string())
        .unwrap_or_default();
    format!(
        r#"<li><a href="/movies/{}">{}</a>{}</li>"#,
        movie.movie_id,
        escape(&movie.title),
        year
    )
}

/// GET /movies
pub async fn list_movies(
    identity: Identity,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, PageError> {
    let (page, limit) = query.normalized();
    let movies = state
        .repo
        .list_movies(limit, query.offset())
        .await
        .map_err(|e| PageError::from_repo("load movies", e))?;

    let mut body = if movies.is_empty() {
        "<p>No movies found.</p>".to_string()
    } else {
        let items: Vec<String> = movies.iter().map(movie_summary).collect();
        format!("<ul class=\"movies\">{}</ul>", items.join("\n"))
    };

    let mut pager = Vec::new();
    if page > 1 {
        pager.push(format!(r#"<a href="/movies?page={}&limit={}">Previous</a>"#, page - 1, limit));
    }
    if movies.len() as i64 == limit {
        pager.push(format!(r#"<a href="/movies?page={}&limit={}">Next</a>"#, page + 1, limit));
    }
    if !pager.is_empty() {
        body.push_str(&format!("<p class=\"pager\">{}</p>", pager.join(" ")));
    }

    Ok(layout("Movies", Some(&identity), &body))
}

fn review_block(review: &Review) -> String {
    let spoiler = if review.contains_spoilers {
        r#" <em class="spoiler">contains spoilers</em>"#
    } else {
        ""
    };
    format!(
        r#"<article class="review"><h3>{} ({}/10)</h3><p class="author">by {}{}</p><p>{}</p></article>"#,
        escape(&review.title),
        review.rating,
        escape(&review.username),
        spoiler,
        escape(&review.content)
    )
}

/// GET /movies/{id}
pub async fn movie_detail(
    identity: Identity,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Html<String>, PageError> {
    let movie_id = parse_id(&raw_id, "Movie")?;
    let movie = state
        .repo
        .get_movie(movie_id)
        .await
        .map_err(|e| PageError::from_repo("load movie", e))?
        .ok_or_else(|| PageError::NotFound("Movie not found".to_string()))?;

    // The page still renders when the secondary lookups fail.
    let reviews = state.repo.get_movie_reviews(movie_id).await.unwrap_or_else(|e| {
        tracing::warn!("Failed to load reviews for {}: {}", movie_id, e);
        Vec::new()
    });
    let in_watchlist = state
        .repo
        .in_watchlist(identity.user_id, movie_id)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to check watchlist for {}: {}", movie_id, e);
            false
        });

    let watchlist_form = if in_watchlist {
        format!(
            r#"<form method="post" action="/watchlist/remove"><input type="hidden" name="movie_id" value="{}"><button type="submit">Remove from watchlist</button></form>"#,
            movie_id
        )
    } else {
        format!(
            r#"<form method="post" action="/watchlist/add"><input type="hidden" name="movie_id" value="{}"><button type="submit">Add to watchlist</button></form>"#,
            movie_id
        )
    };

    let reviews_html = if reviews.is_empty() {
        "<p>No reviews yet.</p>".to_string()
    } else {
        reviews.iter().map(review_block).collect::<Vec<_>>().join("\n")
    };

    let body = format!(
        r#"<p class="overview">{}</p>
<dl>
<dt>Released</dt><dd>{}</dd>
<dt>Runtime</dt><dd>{}</dd>
<dt>Rating</dt><dd>{}</dd>
<dt>Status</dt><dd>{}</dd>
</dl>
{}
<h2>Reviews</h2>
{}
<h2>Write a review</h2>
<form method="post" action="/reviews">
<input type="hidden" name="movie_id" value="{}">
<label>Rating <input type="number" name="rating" min="1" max="10" required></label>
<label>Title <input name="title"></label>
<label>Review <textarea name="content"></textarea></label>
<label><input type="checkbox" name="contains_spoilers" value="on"> Contains spoilers</label>
<button type="submit">Post review</button>
</form>"#,
        escape(movie.overview.as_deref().unwrap_or("")),
        movie.release_date.map(|d| d.to_string()).unwrap_or_else(|| "unknown".into()),
        movie.runtime.map(|r| format!("{} min", r)).unwrap_or_else(|| "unknown".into()),
        movie
            .vote_average
            .map(|v| format!("{:.1} ({} votes)", v, movie.vote_count.unwrap_or(0)))
            .unwrap_or_else(|| "n/a".into()),
        escape(movie.status.as_deref().unwrap_or("")),
        watchlist_form,
        reviews_html,
        movie_id
    );
    Ok(layout(&movie.title, Some(&identity), &body))
}

/// GET /watchlist
pub async fn show_watchlist(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<Html<String>, PageError> {
    let items = state
        .repo
        .get_watchlist(identity.user_id)
        .await
        .map_err(|e| PageError::from_repo("load watchlist", e))?;

    let body = if items.is_empty() {
        r#"<p>Your watchlist is empty. <a href="/movies">Find something to watch</a>.</p>"#.to_string()
    } else {
        let rows: Vec<String> = items
            .iter()
            .map(|item| {
                format!(
                    r#"{}<form method="post" action="/watchlist/remove"><input type="hidden" name="movie_id" value="{}"><button type="submit">Remove</button></form>"#,
                    movie_summary(&item.movie),
                    item.movie_id
                )
            })
            .collect();
        format!("<ul class=\"watchlist\">{}</ul>", rows.join("\n"))
    };
    Ok(layout("Watchlist", Some(&identity), &body))
}

/// POST /watchlist/add
///
/// Sends the browser back where it came from, or to the catalog.
pub async fn add_to_watchlist(
    identity: Identity,
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<WatchlistForm>,
) -> Result<Response, PageError> {
    let movie_id = parse_id(&form.movie_id, "Movie")?;
    state
        .repo
        .get_movie(movie_id)
        .await
        .map_err(|e| PageError::from_repo("load movie", e))?
        .ok_or_else(|| PageError::NotFound("Movie not found".to_string()))?;

    state
        .repo
        .add_to_watchlist(identity.user_id, movie_id)
        .await
        .map_err(|e| PageError::from_repo("add to watchlist", e))?;

    let back = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or("/movies");
    Ok(see_other(back))
}

/// POST /watchlist/remove
pub async fn remove_from_watchlist(
    identity: Identity,
    State(state): State<AppState>,
    Form(form): Form<WatchlistForm>,
) -> Result<Response, PageError> {
    let movie_id = parse_id(&form.movie_id, "Movie")?;
    state
        .repo
        .remove_from_watchlist(identity.user_id, movie_id)
        .await
        .map_err(|e| PageError::from_repo("remove from watchlist", e))?;
    Ok(see_other(&format!("/movies/{}", movie_id)))
}

/// POST /reviews
pub async fn create_review(
    identity: Identity,
    State(state): State<AppState>,
    Form(form): Form<ReviewForm>,
) -> Result<Response, PageError> {
    let movie_id = parse_id(&form.movie_id, "Movie")?;
    let rating = form
        .rating
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|r| RATING_RANGE.contains(r))
        .ok_or_else(|| PageError::BadRequest("Rating must be between 1 and 10".to_string()))?;

    state
        .repo
        .get_movie(movie_id)
        .await
        .map_err(|e| PageError::from_repo("load movie", e))?
        .ok_or_else(|| PageError::NotFound("Movie not found".to_string()))?;

    state
        .repo
        .create_review(NewReview {
            user_id: identity.user_id,
            movie_id,
            rating,
            title: form.title.trim().to_string(),
            content: form.content.trim().to_string(),
            contains_spoilers: form.contains_spoilers.is_some(),
            is_public: true,
        })
        .await
        .map_err(|e| PageError::from_repo("create review", e))?;

    Ok(see_other(&format!("/movies/{}", movie_id)))
}
