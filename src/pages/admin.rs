use axum::{
    Form,
    extract::{Query, State},
    response::{Html, Response},
};
use chrono::NaiveDate;
use serde::Deserialize;

use super::{escape, layout, non_empty, parse_id, see_other};
use crate::{
    AppState,
    auth::Identity,
    error::PageError,
    models::{Movie, MovieInput},
};

/// Movies shown on the admin list.
const ADMIN_LIST_LIMIT: i64 = 100;

/// Admin movie form. Numeric fields arrive as text and blank means "not given".
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MovieForm {
    pub movie_id: String,
    pub title: String,
    pub overview: String,
    pub release_date: String,
    pub imdb_id: String,
    pub vote_average: String,
    pub vote_count: String,
    pub popularity: String,
    pub runtime: String,
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EditQuery {
    pub id: String,
}

fn optional_number<T: std::str::FromStr>(raw: &str, field: &str) -> Result<Option<T>, PageError> {
    match non_empty(raw) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| PageError::BadRequest(format!("Invalid {}", field))),
    }
}

impl MovieForm {
    fn into_input(self) -> Result<MovieInput, PageError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(PageError::BadRequest("Title is required".to_string()));
        }
        let release_date = match non_empty(&self.release_date) {
            None => None,
            Some(raw) => Some(
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .map_err(|_| PageError::BadRequest("Invalid release date".to_string()))?,
            ),
        };
        Ok(MovieInput {
            title,
            overview: non_empty(&self.overview),
            release_date,
            imdb_id: non_empty(&self.imdb_id),
            vote_average: optional_number(&self.vote_average, "vote average")?,
            vote_count: optional_number(&self.vote_count, "vote count")?,
            popularity: optional_number(&self.popularity, "popularity")?,
            runtime: optional_number(&self.runtime, "runtime")?,
            status: non_empty(&self.status),
        })
    }
}

fn field(value: Option<impl ToString>) -> String {
    value.map(|v| escape(&v.to_string())).unwrap_or_default()
}

fn movie_form(action: &str, movie: Option<&Movie>) -> String {
    let hidden_id = movie
        .map(|m| format!(r#"<input type="hidden" name="movie_id" value="{}">"#, m.movie_id))
        .unwrap_or_default();
    format!(
        r#"<form method="post" action="{action}">
{hidden_id}
<label>Title <input name="title" value="{title}" required></label>
<label>Overview <textarea name="overview">{overview}</textarea></label>
<label>Release date <input type="date" name="release_date" value="{release_date}"></label>
<label>IMDb id <input name="imdb_id" value="{imdb_id}"></label>
<label>Vote average <input name="vote_average" value="{vote_average}"></label>
<label>Vote count <input name="vote_count" value="{vote_count}"></label>
<label>Popularity <input name="popularity" value="{popularity}"></label>
<label>Runtime <input name="runtime" value="{runtime}"></label>
<label>Status <input name="status" value="{status}"></label>
<button type="submit">Save</button>
</form>"#,
        title = field(movie.map(|m| m.title.clone())),
        overview = field(movie.and_then(|m| m.overview.clone())),
        release_date = field(movie.and_then(|m| m.release_date)),
        imdb_id = field(movie.and_then(|m| m.imdb_id.clone())),
        vote_average = field(movie.and_then(|m| m.vote_average)),
        vote_count = field(movie.and_then(|m| m.vote_count)),
        popularity = field(movie.and_then(|m| m.popularity)),
        runtime = field(movie.and_then(|m| m.runtime)),
        status = field(movie.and_then(|m| m.status.clone())),
    )
}

/// GET /admin/movies
pub async fn list_movies(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<Html<String>, PageError> {
    let movies = state
        .repo
        .list_movies(ADMIN_LIST_LIMIT, 0)
        .await
        .map_err(|e| PageError::from_repo("load movies", e))?;

    let rows: Vec<String> = movies
        .iter()
        .map(|m| {
            format!(
                r#"<tr><td>{title}</td><td>{status}</td><td><a href="/admin/movies/edit?id={id}">Edit</a></td><td><form method="post" action="/admin/movies/delete"><input type="hidden" name="movie_id" value="{id}"><button type="submit">Delete</button></form></td></tr>"#,
                title = escape(&m.title),
                status = escape(m.status.as_deref().unwrap_or("")),
                id = m.movie_id
            )
        })
        .collect();

    let body = format!(
        r#"<p><a href="/admin/movies/create">Add a movie</a></p>
<table class="movies"><thead><tr><th>Title</th><th>Status</th><th></th><th></th></tr></thead>
<tbody>{}</tbody></table>"#,
        rows.join("\n")
    );
    Ok(layout("Manage movies", Some(&identity), &body))
}

/// GET /admin/movies/create
pub async fn show_create_movie(identity: Identity) -> Html<String> {
    layout("Add movie", Some(&identity), &movie_form("/admin/movies/create", None))
}

/// POST /admin/movies/create
pub async fn create_movie(
    identity: Identity,
    State(state): State<AppState>,
    Form(form): Form<MovieForm>,
) -> Result<Response, PageError> {
    let input = form.into_input()?;
    let movie = state
        .repo
        .create_movie(input)
        .await
        .map_err(|e| PageError::from_repo("create movie", e))?;
    tracing::info!("{} created movie {} ({})", identity.email, movie.title, movie.movie_id);
    Ok(see_other("/admin/movies"))
}

/// GET /admin/movies/edit?id=
pub async fn show_edit_movie(
    identity: Identity,
    State(state): State<AppState>,
    Query(query): Query<EditQuery>,
) -> Result<Html<String>, PageError> {
    let movie_id = parse_id(&query.id, "Movie")?;
    let movie = state
        .repo
        .get_movie(movie_id)
        .await
        .map_err(|e| PageError::from_repo("load movie", e))?
        .ok_or_else(|| PageError::NotFound("Movie not found".to_string()))?;
    Ok(layout(
        "Edit movie",
        Some(&identity),
        &movie_form("/admin/movies/update", Some(&movie)),
    ))
}

/// POST /admin/movies/update
pub async fn update_movie(
    identity: Identity,
    State(state): State<AppState>,
    Form(form): Form<MovieForm>,
) -> Result<Response, PageError> {
    let movie_id = parse_id(&form.movie_id, "Movie")?;
    let input = form.into_input()?;
    state
        .repo
        .update_movie(movie_id, input)
        .await
        .map_err(|e| PageError::from_repo("update movie", e))?
        .ok_or_else(|| PageError::NotFound("Movie not found".to_string()))?;
    tracing::info!("{} updated movie {}", identity.email, movie_id);
    Ok(see_other("/admin/movies"))
}

/// POST /admin/movies/delete
pub async fn delete_movie(
    identity: Identity,
    State(state): State<AppState>,
    Form(form): Form<MovieForm>,
) -> Result<Response, PageError> {
    let movie_id = parse_id(&form.movie_id, "Movie")?;
    let deleted = state
        .repo
        .delete_movie(movie_id)
        .await
        .map_err(|e| PageError::from_repo("delete movie", e))?;
    if deleted {
        tracing::info!("{} deleted movie {}", identity.email, movie_id);
    }
    Ok(see_other("/admin/movies"))
}
