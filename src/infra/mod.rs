pub mod ohsome;
