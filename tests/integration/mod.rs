/// Integration tests over the full core: engine, stores and reminders together
mod backup_restore;
mod core_workflow;
