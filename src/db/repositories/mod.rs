mod reports;
mod sessions;
mod templates;
