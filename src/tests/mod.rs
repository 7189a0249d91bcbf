mod aggregates;
mod helpers;
mod relocation;
