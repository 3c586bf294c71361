
mod search;
mod visibility;
