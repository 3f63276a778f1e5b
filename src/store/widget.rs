/// Read-only projections for the home-screen widget
///
/// Pure functions over cached state, plus the persisted widget theme.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Habit, HabitId, Todo, TodoId};
use crate::storage::{Storage, StorageError};

/// At most this many todos are shown
pub const WIDGET_TODO_LIMIT: usize = 10;

/// Settings key holding the widget theme
pub const WIDGET_THEME_KEY: &str = "widget_theme";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitWidgetItem {
    pub id: HabitId,
    pub name: String,
    pub target_value: u32,
    pub current_value: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoWidgetItem {
    pub id: TodoId,
    pub content: String,
    pub due_date: Option<DateTime<Utc>>,
    pub overdue: bool,
}

/// Active habits scheduled on `today`, with the amount logged so far
pub fn habit_widget_items(
    habits: &[Habit],
    today: NaiveDate,
    current_value: impl Fn(&HabitId) -> u32,
) -> Vec<HabitWidgetItem> {
    habits
        .iter()
        .filter(|habit| !habit.archived && habit.is_scheduled_on(today))
        .map(|habit| HabitWidgetItem {
            id: habit.id.clone(),
            name: habit.name.clone(),
            target_value: habit.target_value,
            current_value: current_value(&habit.id),
        })
        .collect()
}

/// Open todos due today, overdue, or undated
///
/// Dated todos come first by ascending due date, undated ones keep their
/// incoming order after them.
pub fn todo_widget_items(todos: &[Todo], today: NaiveDate) -> Vec<TodoWidgetItem> {
    let mut open: Vec<&Todo> = todos
        .iter()
        .filter(|todo| !todo.is_completed)
        .filter(|todo| todo.due_day().map_or(true, |due| due <= today))
        .collect();
    open.sort_by_key(|todo| (todo.due_date.is_none(), todo.due_date));

    open.into_iter()
        .take(WIDGET_TODO_LIMIT)
        .map(|todo| TodoWidgetItem {
            id: todo.id.clone(),
            content: todo.content.clone(),
            due_date: todo.due_date,
            overdue: todo.due_day().is_some_and(|due| due < today),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetTheme {
    #[default]
    Light,
    Dark,
}

impl WidgetTheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetTheme::Light => "light",
            WidgetTheme::Dark => "dark",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" => Some(WidgetTheme::Light),
            "dark" => Some(WidgetTheme::Dark),
            _ => None,
        }
    }
}

impl fmt::Display for WidgetTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored theme; light when unset or unrecognized
pub async fn load_widget_theme(storage: &dyn Storage) -> Result<WidgetTheme, StorageError> {
    let value = storage.setting(WIDGET_THEME_KEY).await?;
    Ok(value.as_deref().and_then(WidgetTheme::parse).unwrap_or_default())
}

pub async fn save_widget_theme(storage: &dyn Storage, theme: WidgetTheme) -> Result<(), StorageError> {
    storage.set_setting(WIDGET_THEME_KEY, theme.as_str()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Frequency, NewHabit, NewTodo};
    use chrono::{Duration, Local, TimeZone};

    fn at(date: NaiveDate, hour: u32) -> DateTime<Utc> {
        Local
            .from_local_datetime(&date.and_hms_opt(hour, 0, 0).unwrap())
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }

    fn todo(content: &str, due: Option<DateTime<Utc>>) -> Todo {
        Todo::new(NewTodo {
            content: content.to_string(),
            due_date: due,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_todo_projection_order_and_filter() {
        let today = NaiveDate::from_ymd_opt(2024, 4, 10).unwrap();
        let mut done = todo("Done", Some(at(today, 8)));
        done.set_completed(true, Utc::now());

        let todos = vec![
            todo("Undated", None),
            todo("Tomorrow", Some(at(today + Duration::days(1), 8))),
            todo("Today", Some(at(today, 18))),
            todo("Overdue", Some(at(today - Duration::days(2), 9))),
            done,
        ];

        let items = todo_widget_items(&todos, today);
        let names: Vec<&str> = items.iter().map(|i| i.content.as_str()).collect();
        assert_eq!(names, vec!["Overdue", "Today", "Undated"]);
        assert!(items[0].overdue);
        assert!(!items[1].overdue);
    }

    #[test]
    fn test_todo_projection_capped() {
        let today = NaiveDate::from_ymd_opt(2024, 4, 10).unwrap();
        let todos: Vec<Todo> = (0..15).map(|i| todo(&format!("t{i}"), None)).collect();
        assert_eq!(todo_widget_items(&todos, today).len(), WIDGET_TODO_LIMIT);
    }

    #[test]
    fn test_habit_projection_only_scheduled_today() {
        // 2024-04-10 is a Wednesday
        let today = NaiveDate::from_ymd_opt(2024, 4, 10).unwrap();
        let daily = Habit::new(NewHabit {
            name: "Water".to_string(),
            target_value: Some(8),
            ..Default::default()
        })
        .unwrap();
        let weekend = Habit::new(NewHabit {
            name: "Hike".to_string(),
            frequency: Frequency::SpecificDays,
            frequency_days: Some([0, 6].into_iter().collect()),
            ..Default::default()
        })
        .unwrap();

        let items = habit_widget_items(&[daily.clone(), weekend], today, |_| 3);
        assert_eq!(
            items,
            vec![HabitWidgetItem {
                id: daily.id,
                name: "Water".to_string(),
                target_value: 8,
                current_value: 3,
            }]
        );
    }

    #[test]
    fn test_theme_parse() {
        assert_eq!(WidgetTheme::parse("Dark"), Some(WidgetTheme::Dark));
        assert_eq!(WidgetTheme::parse("sepia"), None);
        assert_eq!(WidgetTheme::default().to_string(), "light");
    }
}
