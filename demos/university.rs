use anyhow::Context;
use serde_json::json;
use tracing_subscriber::EnvFilter;
use unistore::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("unistore=info")),
        )
        .init();

    println!("🎓 University Demo\n");

    // Use unistore.toml (or UNISTORE_CONFIG) when present, memory otherwise
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            println!("⚠️  No usable configuration ({}), using the memory provider", err);
            AppConfig::new(DatabaseConfig::memory(), TrackingConfig::default())
        }
    };

    let store = UniStore::new(&config).await?;
    store.health_check().await?;
    println!("✅ Connected to {}", store.provider());

    // Setup
    store.recreate().await?;
    let mut context = store.context();
    let seeded = queries::seed(&mut context)
        .await
        .context("seeding sample data")?;
    println!("✅ Seeded students {} and {}\n", seeded.john, seeded.stuart);

    // Query: students with address and courses
    println!("📚 Students:");
    for details in queries::student_details(&context).await? {
        println!(
            "Name: {}, Address: {}",
            details.student.name,
            details
                .address
                .as_ref()
                .map(|a| a.address.as_str())
                .unwrap_or("-")
        );
        for course in &details.courses {
            println!("\tCourse: {}", course.name);
        }
    }

    for note in queries::notes_of(&context, seeded.john).await? {
        println!("📝 {}", note.text.as_deref().unwrap_or("(empty)"));
    }

    println!("\n📊 Enrollments:");
    for course in queries::course_enrollment_counts(&context).await? {
        println!("Course: {}, #Students: {}", course.name, course.students);
    }

    // Soft delete: the first student is flagged, not erased
    let first = context
        .query::<Student>()
        .order_by("id", SortOrder::Asc)
        .first()
        .await?
        .context("no student to remove")?;
    context.remove(first)?;
    context.save_changes().await?;

    println!("\n🗑️  After removing the first student:");
    for row in queries::student_courses(&context).await? {
        println!("{}", row);
    }
    for student in context.query::<Student>().include_removed().to_list().await? {
        println!(
            "Id: {}, Name: {}, Deleted: {}, Updated: {}",
            student.id, student.name, student.is_deleted, student.updated_at
        );
    }

    // Repository pattern
    let mut uow = store.unit_of_work();
    for student in uow
        .students()
        .get_all(Some(QueryFilter::eq("id", json!(seeded.stuart))))
        .await?
    {
        println!("\n📦 Repository: Id: {}, Name: {}", student.id, student.name);
    }
    uow.students().add(Student::new("Jane", 19))?;
    uow.complete().await?;

    // Pattern matching and elapsed minutes
    for student in queries::students_named_like(&context, "J%").await? {
        println!(
            "🔎 Id: {}, Name: {}, Created minutes ago: {}",
            student.id, student.name, student.created_minutes_ago
        );
    }

    // Raw SQL still gets the soft-delete filter composed on top
    let raw = queries::student_by_id_sql(&context, seeded.stuart);
    match raw.to_query_string() {
        Ok(sql) => {
            println!("\n🧾 {}", sql);
            for student in raw.to_list().await? {
                println!("Id: {}, Name: {}", student.id, student.name);
            }
        }
        Err(StoreError::Unsupported(reason)) => println!("\n🧾 Skipping raw SQL: {}", reason),
        Err(err) => return Err(err.into()),
    }

    // Bulk update bypasses tracking but still stamps updated_at
    let renamed = context
        .query::<Course>()
        .filter(QueryFilter::eq("name", json!("Computer Programming")))
        .execute_update(UpdateSet::new().set("name", json!("Computer Programming I")))
        .await?;
    println!("\n✏️  Renamed {} course(s)", renamed);

    println!("\n🎉 Demo completed");
    Ok(())
}
